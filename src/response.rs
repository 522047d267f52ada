//! Generic api response types
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// A Kubernetes status object
///
/// Delivered inside a watch stream when the event type is `ERROR`, and as the
/// body of failed plain calls. Options are simplified compared to the
/// apimachinery original.
#[derive(Deserialize, Debug, Clone)]
pub struct Status {
    /// Suggested HTTP return code (0 if unset)
    #[serde(default)]
    pub code: u16,

    /// Status of the operation
    ///
    /// One of: `Success` or `Failure` - [more info](https://git.k8s.io/community/contributors/devel/sig-architecture/api-conventions.md#spec-and-status)
    #[serde(default)]
    pub status: String,

    /// A human-readable description of the status of this operation
    #[serde(default)]
    pub message: String,

    /// A machine-readable description of why this operation is in the "Failure" status.
    ///
    /// If this value is empty there is no information available.
    /// A Reason clarifies an HTTP status code but does not override it.
    #[serde(default)]
    pub reason: String,

    /// Extended data associated with the reason.
    ///
    /// Each reason may define its own extended details.
    #[serde(default)]
    pub details: Option<StatusDetails>,
}

/// Status details object on the [`Status`] object
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    /// The name attribute of the resource associated with the status StatusReason (when there is a single name which can be described)
    #[serde(default)]
    pub name: String,

    /// The group attribute of the resource associated with the status StatusReason
    #[serde(default)]
    pub group: String,

    /// The kind attribute of the resource associated with the status StatusReason
    #[serde(default)]
    pub kind: String,

    /// The Causes vector includes more details associated with the failure
    ///
    /// Not all StatusReasons may provide detailed causes.
    #[serde(default)]
    pub causes: Vec<StatusCause>,

    /// If specified, the time in seconds before the operation should be retried.
    #[serde(default)]
    pub retry_after_seconds: u32,
}

/// Status cause object on the [`StatusDetails`] object
#[derive(Deserialize, Debug, Clone)]
pub struct StatusCause {
    /// A machine-readable description of the cause of the error. If this value is empty there is no information available.
    #[serde(default)]
    pub reason: String,

    /// A human-readable description of the cause of the error. This field may be presented as-is to a reader.
    #[serde(default)]
    pub message: String,

    /// The field of the resource that has caused this error, as named by its JSON serialization
    #[serde(default)]
    pub field: String,
}

// The apiserver phrases expired watch windows as
// `too old resource version: <requested> (<oldest available>)`.
static EXPIRED_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"too old resource version: \d+ \((\d+)\)").unwrap());

impl Status {
    /// Extract the restart version suggested by an expired-watch message
    ///
    /// Returns the oldest version the server still holds, i.e. the one to
    /// resume from, or `None` when the message is not about an expired
    /// resource version.
    pub fn expired_resource_version(&self) -> Option<String> {
        EXPIRED_VERSION
            .captures(&self.message)
            .map(|caps| caps[1].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::Status;
    use serde_json::json;

    // ensure our status schema is sensible
    #[test]
    fn status_deserialize_test() {
        let statusresp = r#"{"kind":"Status","apiVersion":"v1","metadata":{},"status":"Failure",
            "message":"too old resource version: 3981707 (3987044)","reason":"Gone","code":410}"#;
        let s: Status = serde_json::from_str(statusresp).unwrap();
        assert_eq!(s.code, 410);
        assert_eq!(s.reason, "Gone");
        assert!(s.details.is_none());

        let statusnodetails = r#"{"kind":"Status","status":"Failure"}"#;
        let s2: Status = serde_json::from_str(statusnodetails).unwrap();
        assert_eq!(s2.code, 0);
        assert_eq!(s2.message, "");
    }

    #[test]
    fn expired_version_is_parsed_from_the_gone_message() {
        let gone: Status = serde_json::from_value(json!({
            "status": "Failure",
            "message": "too old resource version: 3981707 (3987044)",
            "reason": "Gone",
            "code": 410
        }))
        .unwrap();
        assert_eq!(gone.expired_resource_version().as_deref(), Some("3987044"));
    }

    #[test]
    fn expired_version_handles_arbitrary_digit_strings() {
        for (requested, oldest) in [("0", "0"), ("1", "2"), ("99999999999", "12345678901")] {
            let s: Status = serde_json::from_value(json!({
                "message": format!("too old resource version: {} ({})", requested, oldest),
            }))
            .unwrap();
            assert_eq!(s.expired_resource_version().as_deref(), Some(oldest));
        }
    }

    #[test]
    fn unrelated_messages_carry_no_version() {
        for message in ["", "Gone", "too old resource version: abc (123)", "forbidden"] {
            let s: Status = serde_json::from_value(json!({ "message": message })).unwrap();
            assert_eq!(s.expired_resource_version(), None);
        }
    }
}
