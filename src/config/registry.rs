//! Named instance registry
//!
//! The fixed set of instance names whose name hashes are published for
//! governance proposals, split by category.

use serde::{Deserialize, Serialize};

use crate::error::OpsError;
use crate::namehash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Mineable,
    Allowed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedInstance {
    pub name: String,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRegistry {
    /// Instances that earn mining rewards (also allowed)
    #[serde(default = "default_mineable")]
    pub mineable: Vec<String>,
    /// Instances that are allowed but not mineable
    #[serde(default = "default_allowed")]
    pub allowed: Vec<String>,
}

fn default_mineable() -> Vec<String> {
    [
        "eth-01.tornadocash.eth",
        "eth-1.tornadocash.eth",
        "eth-10.tornadocash.eth",
        "eth-100.tornadocash.eth",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_allowed() -> Vec<String> {
    [
        "dai-100.tornadocash.eth",
        "dai-1000.tornadocash.eth",
        "cdai-5000.tornadocash.eth",
        "cdai-50000.tornadocash.eth",
        "usdc-100.tornadocash.eth",
        "usdc-1000.tornadocash.eth",
        "usdt-100.tornadocash.eth",
        "usdt-1000.tornadocash.eth",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for NameRegistry {
    fn default() -> Self {
        Self {
            mineable: default_mineable(),
            allowed: default_allowed(),
        }
    }
}

impl NameRegistry {
    pub fn named(&self, category: Category) -> impl Iterator<Item = NamedInstance> + '_ {
        let names = match category {
            Category::Mineable => &self.mineable,
            Category::Allowed => &self.allowed,
        };
        names.iter().map(move |name| NamedInstance {
            name: name.clone(),
            category,
        })
    }

    /// Every instance, mineable first, input order preserved.
    pub fn instances(&self) -> Vec<NamedInstance> {
        self.named(Category::Mineable)
            .chain(self.named(Category::Allowed))
            .collect()
    }

    pub fn validate(&self) -> Result<(), OpsError> {
        for instance in self.instances() {
            if instance.name.is_empty() {
                return Err(OpsError::Configuration(format!(
                    "{:?} registry contains an empty name",
                    instance.category
                )));
            }
            namehash::normalize(&instance.name)?;
        }
        Ok(())
    }
}
