use thiserror::Error;

/// Why an OSM node could not be obtained. Callers only ever see this as the
/// `source` of [`PosError::OsmNodeNotFound`]; it exists so logs keep the detail.
#[derive(Debug, Error)]
pub enum NodeLookupError {
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("empty response body")]
    EmptyBody,
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed XML attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("unclosed element at end of document")]
    Unbalanced,
    #[error("content outside the root element")]
    OutsideRoot,
    #[error("no <node> element in document")]
    MissingNode,
    #[error("missing `{0}` attribute")]
    MissingCoordinate(&'static str),
    #[error("invalid `{attr}` value '{value}'")]
    InvalidCoordinate { attr: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum PosError {
    #[error("OpenStreetMap node {node_id} not found")]
    OsmNodeNotFound {
        node_id: u64,
        #[source]
        cause: NodeLookupError,
    },
    #[error("OSM node {node_id} is missing required fields: {}", fields.join(", "))]
    MissingFields {
        node_id: u64,
        fields: Vec<&'static str>,
    },
    #[error("a POS named '{name}' already exists")]
    DuplicateName { name: String },
    #[error("POS with ID {id} does not exist")]
    PosNotFound { id: i64 },
    #[error("POS is missing required fields: {}", missing.join(", "))]
    InvalidPos { missing: Vec<&'static str> },
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Caller-facing classification. Both not-found causes share one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    MissingFields,
    DuplicateName,
    InvalidInput,
    Storage,
}

impl PosError {
    pub fn node_not_found(node_id: u64, cause: impl Into<NodeLookupError>) -> Self {
        PosError::OsmNodeNotFound {
            node_id,
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PosError::OsmNodeNotFound { .. } | PosError::PosNotFound { .. } => ErrorKind::NotFound,
            PosError::MissingFields { .. } => ErrorKind::MissingFields,
            PosError::DuplicateName { .. } => ErrorKind::DuplicateName,
            PosError::InvalidPos { .. } => ErrorKind::InvalidInput,
            PosError::Storage(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_causes_share_a_kind() {
        let lookup = PosError::node_not_found(42, NodeLookupError::EmptyBody);
        let missing_pos = PosError::PosNotFound { id: 7 };
        assert_eq!(lookup.kind(), ErrorKind::NotFound);
        assert_eq!(missing_pos.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn not_found_keeps_cause_as_source() {
        use std::error::Error;

        let err = PosError::node_not_found(42, NodeLookupError::MissingCoordinate("lat"));
        assert_eq!(err.to_string(), "OpenStreetMap node 42 not found");
        let source = err.source().expect("cause attached").to_string();
        assert_eq!(source, "missing `lat` attribute");
    }

    #[test]
    fn missing_fields_message_lists_keys_in_order() {
        let err = PosError::MissingFields {
            node_id: 1,
            fields: vec!["name", "addr:city"],
        };
        assert_eq!(
            err.to_string(),
            "OSM node 1 is missing required fields: name, addr:city"
        );
        assert_eq!(err.kind(), ErrorKind::MissingFields);
    }
}
