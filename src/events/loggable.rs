use serde::{Deserialize, Serialize};

/// Retention class attached to every audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Authorization changes and removals; kept indefinitely.
    Critical,
    #[default]
    Important,
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Records that can appear as the subject of an audit entry.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of the event name, e.g. `role` in `role.created`.
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> String;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "revoked" => Severity::Critical,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Thing;

    impl Loggable for Thing {
        fn entity_type() -> &'static str {
            "thing"
        }

        fn subject_id(&self) -> String {
            "1".into()
        }
    }

    #[test]
    fn removals_are_critical() {
        assert_eq!(Thing.severity_for_action("deleted"), Severity::Critical);
        assert_eq!(Thing.severity_for_action("revoked"), Severity::Critical);
        assert_eq!(Thing.severity_for_action("created"), Severity::Important);
        assert_eq!(Severity::default().as_str(), "important");
    }
}
