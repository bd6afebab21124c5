//! Core data models, configuration and errors for the Riak HTTP client

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

/// Result type alias for Riak client operations
pub type Result<T> = std::result::Result<T, RiakError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_type_suffix() {
        assert_eq!(IndexType::Binary.suffix(), "bin");
        assert_eq!(IndexType::Integer.suffix(), "int");
        assert_eq!(IndexType::Binary.index_name("email"), "email_bin");
        assert_eq!(IndexType::Integer.index_name("userAge"), "userage_int");
        assert_eq!(IndexType::from_index_name("age_int"), Some(IndexType::Integer));
        assert_eq!(IndexType::from_index_name("plain"), None);
    }

    #[test]
    fn test_link_tag_defaults_to_bucket() {
        let link = Link::new("people", "alice", None);
        assert_eq!(link.tag(), "people");

        let tagged = Link::new("people", "alice", Some("friend".to_string()));
        assert_eq!(tagged.tag(), "friend");
    }

    #[test]
    fn test_quorum_resolution_order() {
        let defaults = QuorumDefaults::default();
        let bucket = Quorum { r: Some(3), ..Quorum::default() };

        assert_eq!(bucket.resolve_r(None, &defaults), 3);
        assert_eq!(bucket.resolve_r(Some(1), &defaults), 1);
        assert_eq!(bucket.resolve_w(None, &defaults), 2);
    }

    #[test]
    fn test_connectivity_errors() {
        assert!(RiakError::ServerUnreachable.is_connectivity());
        assert!(RiakError::TransportUnavailable { url: "http://x".into() }.is_connectivity());
        assert!(!RiakError::MalformedPayload("x".into()).is_connectivity());
    }
}
