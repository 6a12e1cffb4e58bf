//! Display-name normalization for ontology URIs.
//!
//! URIs are opaque identifiers everywhere in the pipeline. The only place
//! their structure matters is presentation: a URI under one of the known
//! namespaces is shown by its final `#`/`/` segment.

/// Namespaces whose members are displayed by their local name.
pub const KNOWN_NAMESPACES: &[&str] = &[
    "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
    "http://www.w3.org/2000/01/rdf-schema#",
    "http://www.w3.org/2002/07/owl#",
    "http://www.w3.org/2004/02/skos/core#",
    "http://example.org/stix#",
    "http://example.org/network#",
    "http://example.org/entities/",
    "http://example.org/d3f/",
    "http://d3fend.mitre.org/ontologies/d3fend.owl#",
];

/// Human-readable name for a URI.
///
/// Returns the last `#`- or `/`-delimited segment when the URI starts with a
/// known namespace, and the full input otherwise (literals, unknown IRIs).
pub fn display_name(uri: &str) -> &str {
    if KNOWN_NAMESPACES.iter().any(|ns| uri.starts_with(ns)) {
        uri.rsplit(['#', '/']).next().unwrap_or(uri)
    } else {
        uri
    }
}
