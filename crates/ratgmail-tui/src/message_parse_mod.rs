use std::path::PathBuf;

use ratgmail_core::{DEFAULT_FROM, Draft, MessageDetail};

pub(crate) fn reply_subject(subject: &str) -> String {
    format!("Re: {}", subject)
}

pub(crate) fn quote_body(body: &str) -> String {
    body.split('\n')
        .map(|line| format!("> {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Draft shell shown while the reply is being written.
pub(crate) fn seed_reply_draft(original: &MessageDetail) -> Draft {
    Draft {
        from: DEFAULT_FROM.to_string(),
        to: original.summary.from.clone(),
        subject: reply_subject(&original.summary.subject),
        ..Draft::default()
    }
}

/// The message actually sent: the reply text followed by the quoted original.
pub(crate) fn build_reply_draft(
    reply_text: &str,
    original: &MessageDetail,
    attachments: Vec<PathBuf>,
) -> Draft {
    let body = format!(
        "{}\n\n--- Original Message ---\nFrom: {}\nDate: {}\n\n{}",
        reply_text,
        original.summary.from,
        original.summary.date,
        quote_body(original.body_text())
    );
    Draft {
        body,
        attachments,
        ..seed_reply_draft(original)
    }
}

#[cfg(test)]
mod tests {
    use ratgmail_core::{BodyText, MessageSummary};

    use super::*;

    fn original() -> MessageDetail {
        MessageDetail {
            summary: MessageSummary {
                id: "m1".into(),
                subject: "Budget".into(),
                from: "Alice <alice@example.com>".into(),
                date: "Mar 14, 2023 09:05".into(),
                ..MessageSummary::default()
            },
            body: BodyText::Plain("Numbers attached.\nThanks".into()),
            ..MessageDetail::default()
        }
    }

    #[test]
    fn reply_quotes_original() {
        let draft = build_reply_draft("Looks good", &original(), vec![PathBuf::from("a.txt")]);

        assert_eq!(draft.from, "me");
        assert_eq!(draft.to, "Alice <alice@example.com>");
        assert_eq!(draft.subject, "Re: Budget");
        assert_eq!(
            draft.body,
            "Looks good\n\n--- Original Message ---\nFrom: Alice <alice@example.com>\nDate: Mar 14, 2023 09:05\n\n> Numbers attached.\n> Thanks"
        );
        assert_eq!(draft.attachments, vec![PathBuf::from("a.txt")]);
    }

    #[test]
    fn missing_body_quotes_placeholder() {
        let mut detail = original();
        detail.body = BodyText::Missing;
        let draft = build_reply_draft("", &detail, Vec::new());
        assert!(draft.body.ends_with("> (no text content found)"));
    }

    #[test]
    fn empty_lines_are_still_prefixed() {
        assert_eq!(quote_body("a\n\nb"), "> a\n> \n> b");
    }
}
