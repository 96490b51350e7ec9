//! Per-state key tables. A key with no binding in the active context falls
//! through to the focused widget (list, viewport or text input).

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyContext {
    Inbox,
    Viewing,
    Loading,
    Composing,
    Replying,
    Searching,
    ManagingLabels,
    Picker,
    AttachmentEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    ToggleHelp,
    Quit,
    Select,
    Compose,
    Search,
    Labels,
    Trash,
    ToggleRead,
    Reply,
    Download,
    ApplyLabel,
    Back,
    Send,
    NextField,
    PrevField,
    StartAttachment,
    RemoveAttachment,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    code: KeyCode,
    ctrl: bool,
    action: Action,
}

const fn key(code: KeyCode, action: Action) -> Binding {
    Binding {
        code,
        ctrl: false,
        action,
    }
}

const fn ctrl(c: char, action: Action) -> Binding {
    Binding {
        code: KeyCode::Char(c),
        ctrl: true,
        action,
    }
}

const INBOX: &[Binding] = &[
    key(KeyCode::Char('?'), Action::ToggleHelp),
    key(KeyCode::Char('q'), Action::Quit),
    ctrl('c', Action::Quit),
    key(KeyCode::Enter, Action::Select),
    key(KeyCode::Char('c'), Action::Compose),
    key(KeyCode::Char('/'), Action::Search),
    key(KeyCode::Char('l'), Action::Labels),
    key(KeyCode::Char('d'), Action::Trash),
    key(KeyCode::Char('m'), Action::ToggleRead),
];

const VIEWING: &[Binding] = &[
    key(KeyCode::Char('?'), Action::ToggleHelp),
    key(KeyCode::Char('q'), Action::Quit),
    ctrl('c', Action::Quit),
    key(KeyCode::Char('r'), Action::Reply),
    ctrl('d', Action::Download),
    key(KeyCode::Char('l'), Action::Labels),
    key(KeyCode::Char('d'), Action::Trash),
    key(KeyCode::Char('m'), Action::ToggleRead),
    key(KeyCode::Char('b'), Action::Back),
    key(KeyCode::Esc, Action::Back),
];

const LOADING: &[Binding] = &[key(KeyCode::Char('?'), Action::ToggleHelp)];

const COMPOSING: &[Binding] = &[
    ctrl('s', Action::Send),
    key(KeyCode::Tab, Action::NextField),
    key(KeyCode::BackTab, Action::PrevField),
    ctrl('a', Action::StartAttachment),
    ctrl('x', Action::RemoveAttachment),
    key(KeyCode::Esc, Action::Back),
];

const REPLYING: &[Binding] = &[
    ctrl('s', Action::Send),
    ctrl('a', Action::StartAttachment),
    ctrl('x', Action::RemoveAttachment),
    key(KeyCode::Esc, Action::Back),
];

const SEARCHING: &[Binding] = &[
    key(KeyCode::Enter, Action::Select),
    key(KeyCode::Esc, Action::Back),
];

const MANAGING_LABELS: &[Binding] = &[
    key(KeyCode::Char('?'), Action::ToggleHelp),
    key(KeyCode::Enter, Action::Select),
    key(KeyCode::Char('a'), Action::ApplyLabel),
    key(KeyCode::Char('b'), Action::Back),
    key(KeyCode::Esc, Action::Back),
];

const PICKER: &[Binding] = &[
    key(KeyCode::Char('?'), Action::ToggleHelp),
    key(KeyCode::Char('b'), Action::Back),
    key(KeyCode::Esc, Action::Back),
];

// Ctrl+S is kept so a draft can be sent without leaving the path prompt.
const ATTACHMENT_ENTRY: &[Binding] = &[
    key(KeyCode::Enter, Action::Select),
    key(KeyCode::Esc, Action::Back),
    ctrl('s', Action::Send),
];

fn table(ctx: KeyContext) -> &'static [Binding] {
    match ctx {
        KeyContext::Inbox => INBOX,
        KeyContext::Viewing => VIEWING,
        KeyContext::Loading => LOADING,
        KeyContext::Composing => COMPOSING,
        KeyContext::Replying => REPLYING,
        KeyContext::Searching => SEARCHING,
        KeyContext::ManagingLabels => MANAGING_LABELS,
        KeyContext::Picker => PICKER,
        KeyContext::AttachmentEntry => ATTACHMENT_ENTRY,
    }
}

fn matches(binding: &Binding, event: &KeyEvent) -> bool {
    let code = match event.code {
        KeyCode::Char(c) if binding.ctrl => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    };
    if code != binding.code {
        return false;
    }
    let has_ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    if binding.ctrl {
        return has_ctrl;
    }
    !has_ctrl && !event.modifiers.contains(KeyModifiers::ALT)
}

pub(crate) fn lookup(ctx: KeyContext, event: KeyEvent) -> Option<Action> {
    table(ctx)
        .iter()
        .find(|binding| matches(binding, &event))
        .map(|binding| binding.action)
}
