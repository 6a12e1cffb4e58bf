//! Structured graph queries over the knowledge base.
//!
//! [`SparqlGraph`] holds the ontology in an in-memory oxigraph store and
//! answers SPARQL SELECT queries. [`QueryTranslator`] asks the chat model to
//! turn an analyst's question into such a query. Rows come back either as
//! whole triples or as bare entity URIs; [`context_from_rows`] turns both
//! into context groups.

use std::io::Read;
use std::path::Path;

use oxigraph::io::RdfFormat;
use oxigraph::model::{GraphNameRef, Literal, NamedNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::context::{ContextGroup, MatchMode, assemble};
use crate::corpus::turtle::term_value;
use crate::corpus::{Triple, TripleCorpus};
use crate::error::{DataError, GraphError, SecGraphResult, ServiceError};
use crate::llm::{ChatMessage, ChatModel};

type GraphResult<T> = Result<T, GraphError>;

/// One result row of a graph query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphRow {
    Triple {
        subject: String,
        predicate: String,
        object: String,
    },
    Uri(String),
}

impl GraphRow {
    /// Interpret a row of `(variable, value)` bindings.
    ///
    /// `subject`/`predicate`/`object` (or `s`/`p`/`o`) give a triple row;
    /// otherwise a `uri` binding gives a URI row. Anything else is `None`.
    pub fn from_bindings(row: &[(String, String)]) -> Option<Self> {
        let get = |names: &[&str]| {
            row.iter()
                .find(|(var, _)| names.contains(&var.as_str()))
                .map(|(_, value)| value.clone())
        };
        if let (Some(subject), Some(predicate), Some(object)) = (
            get(&["subject", "s"]),
            get(&["predicate", "p"]),
            get(&["object", "o"]),
        ) {
            return Some(GraphRow::Triple {
                subject,
                predicate,
                object,
            });
        }
        get(&["uri"]).map(GraphRow::Uri)
    }
}

/// Something that executes a query string and returns rows.
pub trait GraphQuery {
    fn query(&self, query: &str) -> GraphResult<Vec<GraphRow>>;
}

/// In-memory SPARQL store over the knowledge base.
pub struct SparqlGraph {
    store: Store,
}

impl SparqlGraph {
    fn empty() -> GraphResult<Self> {
        let store = Store::new().map_err(|e| GraphError::Store {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self { store })
    }

    /// Load a Turtle document, keeping term types (IRI, literal, blank node).
    pub fn from_turtle(reader: impl Read) -> GraphResult<Self> {
        let graph = Self::empty()?;
        graph
            .store
            .load_from_reader(RdfFormat::Turtle, reader)
            .map_err(|e| GraphError::Store {
                message: format!("failed to load Turtle: {e}"),
            })?;
        tracing::info!(statements = graph.len()?, "graph store loaded from Turtle");
        Ok(graph)
    }

    /// Load a Turtle file.
    pub fn open_turtle(path: &Path) -> SecGraphResult<Self> {
        let file = std::fs::File::open(path).map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_turtle(std::io::BufReader::new(file))?)
    }

    /// Rebuild a store from the flattened corpus.
    ///
    /// Terms that parse as absolute IRIs become named nodes; other objects
    /// become plain literals. Statements whose subject or predicate is not
    /// an IRI are skipped.
    pub fn from_corpus(corpus: &TripleCorpus) -> GraphResult<Self> {
        let graph = Self::empty()?;
        let mut skipped = 0usize;
        for triple in corpus.all() {
            let (Ok(subject), Ok(predicate)) = (
                NamedNode::new(triple.subject()),
                NamedNode::new(triple.predicate()),
            ) else {
                skipped += 1;
                continue;
            };
            let object: Term = match NamedNode::new(triple.object()) {
                Ok(node) => node.into(),
                Err(_) => Literal::new_simple_literal(triple.object()).into(),
            };
            let quad = Quad::new(subject, predicate, object, GraphNameRef::DefaultGraph);
            graph.store.insert(&quad).map_err(|e| GraphError::Store {
                message: format!("insert failed: {e}"),
            })?;
        }
        if skipped > 0 {
            tracing::warn!(skipped, "statements without IRI subject/predicate left out of graph store");
        }
        tracing::info!(statements = graph.len()?, "graph store built from corpus");
        Ok(graph)
    }

    /// Execute a SELECT query and return each solution as `(variable, value)` pairs.
    pub fn query_select(&self, sparql: &str) -> GraphResult<Vec<Vec<(String, String)>>> {
        let results = self.store.query(sparql).map_err(|e| GraphError::Query {
            message: format!("SPARQL query failed: {e}"),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| GraphError::Query {
                        message: format!("solution error: {e}"),
                    })?;
                    rows.push(
                        solution
                            .iter()
                            .map(|(var, term)| (var.as_str().to_string(), term_value(term)))
                            .collect(),
                    );
                }
                Ok(rows)
            }
            QueryResults::Boolean(_) | QueryResults::Graph(_) => Err(GraphError::Query {
                message: "only SELECT queries are supported".into(),
            }),
        }
    }

    /// Number of statements in the store.
    pub fn len(&self) -> GraphResult<usize> {
        self.store.len().map_err(|e| GraphError::Store {
            message: e.to_string(),
        })
    }

    pub fn is_empty(&self) -> GraphResult<bool> {
        self.len().map(|n| n == 0)
    }
}

impl GraphQuery for SparqlGraph {
    fn query(&self, query: &str) -> GraphResult<Vec<GraphRow>> {
        let mut rows = Vec::new();
        for bindings in self.query_select(query)? {
            match GraphRow::from_bindings(&bindings) {
                Some(row) => rows.push(row),
                None => tracing::debug!(?bindings, "skipping row without triple or uri bindings"),
            }
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for SparqlGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlGraph").finish()
    }
}

/// Turn query rows into context.
///
/// Triple rows are used as-is, grouped by subject in first-seen order. URI
/// rows are expanded through [`assemble`] against the corpus.
pub fn context_from_rows(rows: &[GraphRow], corpus: &TripleCorpus, mode: MatchMode) -> Vec<ContextGroup> {
    let mut groups: Vec<ContextGroup> = Vec::new();
    let mut uris: Vec<&str> = Vec::new();

    for row in rows {
        match row {
            GraphRow::Triple {
                subject,
                predicate,
                object,
            } => {
                let Ok(triple) = Triple::new(subject.as_str(), predicate.as_str(), object.as_str()) else {
                    continue;
                };
                match groups.iter_mut().find(|g| g.entity == *subject) {
                    Some(group) => {
                        if !group.triples.contains(&triple) {
                            group.triples.push(triple);
                        }
                    }
                    None => groups.push(ContextGroup {
                        entity: subject.clone(),
                        score: None,
                        triples: vec![triple],
                    }),
                }
            }
            GraphRow::Uri(uri) => {
                if !uris.contains(&uri.as_str()) {
                    uris.push(uri);
                }
            }
        }
    }

    groups.extend(assemble(&uris, corpus, mode));
    groups
}

const TRANSLATOR_SYSTEM_PROMPT: &str = "\
You translate natural language questions about a network security knowledge graph \
into SPARQL SELECT queries. Output only the query with no additional text.
The query must return either triples, binding ?subject ?predicate ?object, or the \
URIs of the entities involved, binding ?uri.

### Prefixes
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX net: <http://example.org/network#>
PREFIX stix: <http://example.org/stix#>
PREFIX d3f: <http://d3fend.mitre.org/ontologies/d3fend.owl#>

### Graph Schema
Entities: net:Network, net:DNSServer, net:VPNServer, net:Router, net:Firewall, \
net:WirelessAccessPoint, net:LaptopComputer, net:DesktopComputer, net:MobilePhone, \
d3f:Server, d3f:MailServer, stix:AttackPattern, stix:CourseOfAction, \
stix:DataComponent, stix:Malware, stix:IntrusionSet.
Relationships: net:contains (Network to node), net:wired_connection (server to Router), \
net:wireless_connection (computer to WirelessAccessPoint), net:provides_vpn_access, \
net:delivers_mail, net:resolves_mail, net:validates_mail_domains, net:filter_traffic \
(Firewall to Server or Router), stix:mitigates (CourseOfAction to AttackPattern), \
stix:detects (DataComponent to AttackPattern), stix:uses (Malware or IntrusionSet to AttackPattern).

### Examples
Question: Are there DNS or NTP services in LAN1?
SELECT ?subject ?predicate ?object WHERE {
  ?subject rdfs:label \"LAN 1\" . ?subject net:contains ?object .
  BIND(net:contains AS ?predicate)
  FILTER(CONTAINS(LCASE(STR(?object)), \"dns\") || CONTAINS(LCASE(STR(?object)), \"ntp\"))
}

Question: How can I mitigate a Reflection Amplification attack?
SELECT ?uri WHERE {
  ?uri stix:mitigates ?o .
  FILTER(CONTAINS(LCASE(STR(?o)), \"reflectionamplification\"))
}";

/// Natural-language to SPARQL translation through a chat model.
pub struct QueryTranslator<'a, C: ?Sized> {
    chat: &'a C,
}

impl<'a, C: ChatModel + ?Sized> QueryTranslator<'a, C> {
    pub fn new(chat: &'a C) -> Self {
        Self { chat }
    }

    pub fn translate(&self, question: &str) -> Result<String, ServiceError> {
        let messages = [
            ChatMessage::system(TRANSLATOR_SYSTEM_PROMPT),
            ChatMessage::user(format!("Question:\n{question}")),
        ];
        let reply = self.chat.chat(&messages)?;
        let query = strip_code_fence(&reply);
        tracing::debug!(%query, "translated question to SPARQL");
        Ok(query)
    }
}

/// Remove a surrounding Markdown code fence (with optional language tag).
fn strip_code_fence(reply: &str) -> String {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}
