//! Turtle ontology loader backed by oxigraph's RDF parser.
//!
//! Terms are flattened to strings: IRIs keep their full form, blank nodes
//! their label, literals their lexical value (datatype and language tag are
//! dropped). Duplicate statements collapse, as in an RDF graph.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Term;

use crate::error::DataError;

use super::Triple;

/// String form of an RDF term.
pub(crate) fn term_value(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.as_str().to_string(),
        Term::BlankNode(b) => b.as_str().to_string(),
        Term::Literal(l) => l.value().to_string(),
        #[allow(unreachable_patterns)]
        other => other.to_string(),
    }
}

/// Parse Turtle from a reader into string triples, in document order.
pub fn parse_turtle(reader: impl Read) -> Result<Vec<Triple>, DataError> {
    let mut seen = HashSet::new();
    let mut triples = Vec::new();
    let mut skipped = 0usize;

    for quad in RdfParser::from_format(RdfFormat::Turtle).for_reader(reader) {
        let quad = quad.map_err(|e| DataError::Rdf {
            message: e.to_string(),
        })?;
        let subject = term_value(&Term::from(quad.subject));
        let predicate = quad.predicate.as_str().to_string();
        let object = term_value(&quad.object);

        match Triple::new(subject, predicate, object) {
            Ok(triple) => {
                if seen.insert(triple.clone()) {
                    triples.push(triple);
                }
            }
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "dropped statements with empty terms");
    }
    Ok(triples)
}

/// Load a Turtle file. A file without statements is an error.
pub fn load_turtle(path: &Path) -> Result<Vec<Triple>, DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let triples = parse_turtle(std::io::BufReader::new(file))?;
    if triples.is_empty() {
        return Err(DataError::EmptyCorpus {
            origin: path.display().to_string(),
        });
    }
    tracing::info!(path = %path.display(), triples = triples.len(), "ontology parsed");
    Ok(triples)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORK_TTL: &str = r#"
@prefix net: <http://example.org/network#> .
@prefix stix: <http://example.org/stix#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

net:LAN1 net:contains net:DNSServer1 ;
    rdfs:label "LAN 1" .
net:DNSServer1 net:wired_connection net:Router1 .
stix:OSExhaustionFlood stix:impact-type "Availability" .
net:LAN1 net:contains net:DNSServer1 .
"#;

    #[test]
    fn parses_iris_and_literals() {
        let triples = parse_turtle(NETWORK_TTL.as_bytes()).unwrap();
        assert_eq!(triples.len(), 4);

        let first = &triples[0];
        assert_eq!(first.subject(), "http://example.org/network#LAN1");
        assert_eq!(first.predicate(), "http://example.org/network#contains");
        assert_eq!(first.object(), "http://example.org/network#DNSServer1");

        assert!(triples.iter().any(|t| t.object() == "LAN 1"));
        assert!(triples.iter().any(|t| t.object() == "Availability"));
    }

    #[test]
    fn empty_literals_are_skipped() {
        let ttl = r#"<http://example.org/a> <http://example.org/p> "" .
<http://example.org/a> <http://example.org/p> <http://example.org/b> ."#;
        let triples = parse_turtle(ttl.as_bytes()).unwrap();
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn malformed_turtle_is_a_data_error() {
        let err = parse_turtle("<http://example.org/a> <http://example.org/p> .".as_bytes())
            .unwrap_err();
        assert!(matches!(err, DataError::Rdf { .. }));
    }

    #[test]
    fn load_turtle_rejects_empty_documents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.ttl");
        std::fs::write(&path, "@prefix ex: <http://example.org/> .\n").unwrap();
        assert!(matches!(
            load_turtle(&path),
            Err(DataError::EmptyCorpus { .. })
        ));
    }
}
