use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

const FALLBACK_FILENAME: &str = "attachment";

/// Maps every character other than letters, digits, space, `-`, `_` and `.`
/// to `_`. Names that would resolve to the current or parent directory fall
/// back to a fixed name, so the result is always a single path component.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(|c| c == '.' || c == ' ').is_empty() {
        return FALLBACK_FILENAME.to_string();
    }
    cleaned
}

/// Attachment payloads come URL-safe encoded; padding, when present, is ignored.
pub fn decode_attachment_data(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(data.trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_and_controls_are_replaced() {
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("a\\b\nc\td.txt"), "a_b_c_d.txt");
        assert_eq!(sanitize_filename("q3 report-final_v2.pdf"), "q3 report-final_v2.pdf");
    }

    #[test]
    fn unicode_letters_survive() {
        assert_eq!(sanitize_filename("résumé.pdf"), "résumé.pdf");
        assert_eq!(sanitize_filename("日本語:メモ.txt"), "日本語_メモ.txt");
    }

    #[test]
    fn dot_only_names_fall_back() {
        assert_eq!(sanitize_filename(".."), "attachment");
        assert_eq!(sanitize_filename("."), "attachment");
        assert_eq!(sanitize_filename(""), "attachment");
        assert_eq!(sanitize_filename(" . "), "attachment");
    }

    #[test]
    fn sanitized_name_stays_inside_directory() {
        let base = std::path::Path::new("downloads");
        for raw in ["../x", "/abs/path", "..", "a/../../b", "c:\\win\\file"] {
            let joined = base.join(sanitize_filename(raw));
            assert_eq!(joined.parent(), Some(base), "{raw} escaped");
        }
    }

    #[test]
    fn attachment_data_decodes_with_or_without_padding() {
        assert_eq!(decode_attachment_data("aGk").unwrap(), b"hi");
        assert_eq!(decode_attachment_data("aGk=").unwrap(), b"hi");
        assert_eq!(decode_attachment_data("-_-_").unwrap(), vec![0xfb, 0xff, 0xbf]);
        assert!(decode_attachment_data("***").is_err());
    }
}
