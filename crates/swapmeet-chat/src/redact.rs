use lazy_static::lazy_static;
use regex::Regex;

/// Replacement text for a scrubbed address.
pub const EMAIL_PLACEHOLDER: &str = "(email removed)";

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap();
}

/// Replaces every email-shaped substring. `None` when there was nothing to
/// replace, so callers can skip the write.
pub fn redact_emails(text: &str) -> Option<String> {
    if !EMAIL_REGEX.is_match(text) {
        return None;
    }
    Some(EMAIL_REGEX.replace_all(text, EMAIL_PLACEHOLDER).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_address() {
        let out = redact_emails("mail me at jo.bloggs+x@example.co.uk or a@b.io please").unwrap();
        assert_eq!(out, "mail me at (email removed) or (email removed) please");
    }

    #[test]
    fn leaves_clean_text_alone() {
        assert_eq!(redact_emails("collect from the porch @ 5pm"), None);
        assert_eq!(redact_emails("name@host"), None);
    }
}
