//! Class compatibility check for `CLAZZ_CHECK`.
//!
//! The server asks whether a rule-implementation class, named as a string,
//! exists on the client and can serve as a given node kind. Classes are
//! resolved through a [`TypeLoader`]; the bundled [`ClassRegistry`] is a plain
//! table the embedding application fills in at startup.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock};

use ice_protocol::{ClazzCheck, NodeType};
use thiserror::Error;
use tracing::warn;

const CLAZZ_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::clazz");

/// A node kind a class can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Backs [`NodeType::All`].
    AllRelation,
    /// Backs [`NodeType::And`].
    AndRelation,
    /// Backs [`NodeType::None`].
    NoneRelation,
    /// Backs [`NodeType::True`].
    TrueRelation,
    /// Backs [`NodeType::Any`].
    AnyRelation,
    /// Backs [`NodeType::LeafFlow`].
    FlowLeaf,
    /// Backs [`NodeType::LeafNone`].
    NoneLeaf,
    /// Backs [`NodeType::LeafResult`].
    ResultLeaf,
}

impl Capability {
    /// Capability a class needs to back a node of `node_type`.
    #[must_use]
    pub const fn required_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::All => Self::AllRelation,
            NodeType::And => Self::AndRelation,
            NodeType::None => Self::NoneRelation,
            NodeType::True => Self::TrueRelation,
            NodeType::Any => Self::AnyRelation,
            NodeType::LeafFlow => Self::FlowLeaf,
            NodeType::LeafNone => Self::NoneLeaf,
            NodeType::LeafResult => Self::ResultLeaf,
        }
    }
}

/// What a loader knows about a resolved class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassInfo {
    capabilities: BTreeSet<Capability>,
}

impl ClassInfo {
    /// A class implementing `capabilities`.
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            capabilities: capabilities.into_iter().collect(),
        }
    }

    /// Returns `true` when the class implements `capability`.
    #[must_use]
    pub fn satisfies(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A loader failed for a reason other than the class being absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load {clazz}: {reason}")]
pub struct TypeLoadError {
    /// Class that was being resolved.
    pub clazz: String,
    /// Loader-specific description of the failure.
    pub reason: String,
}

/// Resolves class names on the client.
pub trait TypeLoader: Send + Sync + fmt::Debug {
    /// Looks up `clazz`. `Ok(None)` means the class does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TypeLoadError`] when the lookup itself fails.
    fn load(&self, clazz: &str) -> Result<Option<ClassInfo>, TypeLoadError>;
}

/// In-memory class table.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<String, ClassInfo>>,
}

impl ClassRegistry {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `clazz` with the capabilities it implements, replacing any
    /// earlier registration.
    pub fn register(
        &self,
        clazz: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) {
        self.classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(clazz.into(), ClassInfo::new(capabilities));
    }

    /// Builder form of [`Self::register`].
    #[must_use]
    pub fn with_class(
        self,
        clazz: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        self.register(clazz, capabilities);
        self
    }
}

impl TypeLoader for ClassRegistry {
    fn load(&self, clazz: &str) -> Result<Option<ClassInfo>, TypeLoadError> {
        Ok(self
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(clazz)
            .cloned())
    }
}

/// Checks that `clazz` exists and can back a node tagged `node_type`.
///
/// Never fails: every problem is reported in the returned [`ClazzCheck`],
/// with `address` identifying the answering client.
pub fn check_clazz(
    loader: &dyn TypeLoader,
    address: &str,
    clazz: &str,
    node_type: u8,
) -> ClazzCheck {
    let info = match loader.load(clazz) {
        Ok(Some(info)) => info,
        Ok(None) => {
            return ClazzCheck::failed(format!(
                "class not found in {address} input({clazz}|{node_type})"
            ));
        }
        Err(error) => {
            warn!(target: CLAZZ_TARGET, %error, "class lookup failed");
            return ClazzCheck::failed(address);
        }
    };
    match NodeType::from_byte(node_type) {
        Ok(kind) if info.satisfies(Capability::required_for(kind)) => ClazzCheck::passed(),
        Ok(_) => ClazzCheck::failed(format!(
            "type not match in {address} input({clazz}|{node_type})"
        )),
        Err(_) => ClazzCheck::failed(address),
    }
}
