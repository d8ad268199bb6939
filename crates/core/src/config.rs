use serde::{Deserialize, Serialize};

use crate::mesh::MaterialRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub default_material: MaterialRef,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_material: MaterialRef::default(),
        }
    }
}
