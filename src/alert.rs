//! Bootstrap alert fragments.

use crate::security::escape;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Error,
    Info,
    Warning,
}

impl AlertKind {
    /// Severity suffix of the `alert-*` class.
    pub fn class(self) -> &'static str {
        match self {
            AlertKind::Success => "success",
            AlertKind::Error => "danger",
            AlertKind::Info => "info",
            AlertKind::Warning => "warning",
        }
    }
}

/// Renders alert markup. The message is always escaped here.
pub struct Alert;

impl Alert {
    pub fn success(message: &str) -> String {
        Self::render(AlertKind::Success, message, true)
    }

    pub fn error(message: &str) -> String {
        Self::render(AlertKind::Error, message, true)
    }

    pub fn info(message: &str) -> String {
        Self::render(AlertKind::Info, message, true)
    }

    pub fn warning(message: &str) -> String {
        Self::render(AlertKind::Warning, message, true)
    }

    pub fn render(kind: AlertKind, message: &str, dismissible: bool) -> String {
        let (dismissible_class, close_button) = if dismissible {
            (
                " alert-dismissible fade show",
                r#"<button type="button" class="btn-close" data-bs-dismiss="alert"></button>"#,
            )
        } else {
            ("", "")
        };
        format!(
            r#"<div class="alert alert-{}{}" role="alert">{}{}</div>"#,
            kind.class(),
            dismissible_class,
            escape(message),
            close_button
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_error_markers_differ() {
        let ok = Alert::success("x");
        let err = Alert::error("x");
        assert!(ok.contains(r#"class="alert alert-success alert-dismissible fade show""#));
        assert!(err.contains("alert-danger"));
        assert!(!err.contains("alert-success"));
        assert!(ok.contains(">x<"));
    }

    #[test]
    fn message_is_escaped() {
        let out = Alert::warning("<b>Fichier</b> & co");
        assert!(out.contains("&lt;b&gt;Fichier&lt;/b&gt; &amp; co"));
        assert!(!out.contains("<b>"));
    }

    #[test]
    fn non_dismissible_has_no_close_button() {
        let out = Alert::render(AlertKind::Info, "note", false);
        assert_eq!(out, r#"<div class="alert alert-info" role="alert">note</div>"#);
    }

    #[test]
    fn dismissible_has_close_button() {
        let out = Alert::info("note");
        assert!(out.ends_with(
            r#"note<button type="button" class="btn-close" data-bs-dismiss="alert"></button></div>"#
        ));
    }
}
