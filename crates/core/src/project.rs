use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::generator::{Generator, GeneratorError};
use crate::graph::{NodeId, PinKind};
use crate::params::{NodeParams, ParamError};

pub const PROJECT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
    pub pin: String,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub key: String,
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: NodeParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub from: Endpoint,
    pub to: Endpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("project version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("unknown module kind `{0}`")]
    UnknownKind(String),
    #[error("duplicate node key `{0}`")]
    DuplicateKey(String),
    #[error("unknown node key `{0}`")]
    UnknownNode(String),
    #[error("node `{node}`: {source}")]
    Param {
        node: String,
        #[source]
        source: ParamError,
    },
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

fn node_key(node: NodeId) -> String {
    format!("n{}", node.0)
}

impl Generator {
    pub fn to_record(&self) -> GraphRecord {
        let graph = self.graph();
        let nodes = graph
            .nodes()
            .map(|node| NodeRecord {
                key: node_key(node.id),
                kind: node.name.clone(),
                enabled: self.is_enabled(node.id),
                params: self.params(node.id).unwrap_or_default(),
            })
            .collect();

        let endpoint = |pin_id| {
            graph.pin(pin_id).map(|pin| Endpoint {
                node: node_key(pin.node),
                pin: pin.name.clone(),
            })
        };
        let links = graph
            .links()
            .filter_map(|link| {
                Some(LinkRecord {
                    from: endpoint(link.from)?,
                    to: endpoint(link.to)?,
                })
            })
            .collect();

        GraphRecord { nodes, links }
    }

    /// Rebuilds a generator from `record`. Returns it together with the map
    /// from record keys to the new node ids.
    pub fn from_record(
        record: &GraphRecord,
        config: GeneratorConfig,
    ) -> Result<(Generator, BTreeMap<String, NodeId>), RecordError> {
        let mut generator = Generator::new(config);
        let mut keys = BTreeMap::new();

        for node in &record.nodes {
            if keys.contains_key(&node.key) {
                return Err(RecordError::DuplicateKey(node.key.clone()));
            }
            let id = match generator.add_module_by_name(&node.kind) {
                Ok(id) => id,
                Err(GeneratorError::UnknownKind(kind)) => return Err(RecordError::UnknownKind(kind)),
                Err(err) => return Err(err.into()),
            };
            for (name, value) in &node.params.values {
                generator
                    .set_param(id, name, value.clone())
                    .map_err(|err| match err {
                        GeneratorError::Param(source) => RecordError::Param {
                            node: node.key.clone(),
                            source,
                        },
                        other => other.into(),
                    })?;
            }
            generator.set_enabled(id, node.enabled)?;
            keys.insert(node.key.clone(), id);
        }

        let lookup = |key: &str| {
            keys.get(key)
                .copied()
                .ok_or_else(|| RecordError::UnknownNode(key.to_string()))
        };
        for link in &record.links {
            let from_node = lookup(&link.from.node)?;
            let to_node = lookup(&link.to.node)?;
            let from = generator.find_pin(from_node, &link.from.pin, PinKind::Output)?;
            let to = generator.find_pin(to_node, &link.to.pin, PinKind::Input)?;
            generator.connect(from, to)?;
        }

        tracing::debug!(
            nodes = record.nodes.len(),
            links = record.links.len(),
            "graph restored"
        );
        Ok((generator, keys))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub version: u32,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub graph: GraphRecord,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            version: PROJECT_VERSION,
            settings: ProjectSettings::default(),
            graph: GraphRecord::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub config: GeneratorConfig,
}

impl Project {
    pub fn from_generator(generator: &Generator) -> Self {
        Self {
            version: PROJECT_VERSION,
            settings: ProjectSettings {
                config: generator.config().clone(),
            },
            graph: generator.to_record(),
        }
    }

    pub fn build(&self) -> Result<(Generator, BTreeMap<String, NodeId>), RecordError> {
        if self.version > PROJECT_VERSION {
            return Err(RecordError::UnsupportedVersion {
                found: self.version,
                supported: PROJECT_VERSION,
            });
        }
        Generator::from_record(&self.graph, self.settings.config.clone())
    }
}
