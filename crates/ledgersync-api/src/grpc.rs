//! The gRPC mirror of the sync surface.
//!
//! Protocol-buffer code generation is explicitly out of scope (//! "Out of scope: protocol-buffer code generation"). This module
//! therefore does not generate `.proto`-derived service code; it documents
//! the header ↔ metadata mapping the pipeline would apply if a gRPC
//! front-end were wired up, and exposes the header names a `tonic`-based
//! service could map into its own [`tonic::Request`] metadata before
//! reusing [`crate::pipeline::PipelineContext`] and the handlers in
//! [`crate::handlers`] unchanged — the pipeline's extractors only depend
//! on header lookups, not on the HTTP/1.1 transport itself.
//!
//! [`tonic::Request`]: https://docs.rs/tonic/latest/tonic/struct.Request.html

use crate::pipeline::{CORRELATION_HEADER, EPOCH_HEADER, SESSION_HEADER};

/// One HTTP header ↔ gRPC metadata key mapping entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMetadataMapping {
    pub http_header: &'static str,
    pub grpc_metadata_key: &'static str,
}

/// The full mapping table the gRPC front-end would apply to every call,
/// mirroring the HTTP pipeline's header reads ("The same chain
/// is replicated for the gRPC front-end with header names mapped to
/// metadata keys").
pub const HEADER_METADATA_MAPPINGS: &[HeaderMetadataMapping] = &[
    HeaderMetadataMapping {
        http_header: CORRELATION_HEADER,
        grpc_metadata_key: "x-correlation-id-bin",
    },
    HeaderMetadataMapping {
        http_header: SESSION_HEADER,
        grpc_metadata_key: "x-sync-session-bin",
    },
    HeaderMetadataMapping {
        http_header: EPOCH_HEADER,
        grpc_metadata_key: "x-sync-epoch-bin",
    },
    HeaderMetadataMapping {
        http_header: "authorization",
        grpc_metadata_key: "authorization",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pipeline_header_has_a_metadata_mapping() {
        let headers: Vec<&str> = HEADER_METADATA_MAPPINGS.iter().map(|m| m.http_header).collect();
        assert!(headers.contains(&CORRELATION_HEADER));
        assert!(headers.contains(&SESSION_HEADER));
        assert!(headers.contains(&EPOCH_HEADER));
    }
}
