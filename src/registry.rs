//! Version registry and resolution.
//!
//! Versions are keyed by name and compared as plain strings, so callers
//! must use a consistently sortable naming scheme (ISO-like dates work).
//! Resolution downgrades: an inexact request selects the greatest
//! registered version that is not greater than the request, and a request
//! beyond every registered version selects the greatest one.

use serde_json::Value;

use crate::catalog::SchemaCatalog;
use crate::config::CompileConfig;
use crate::error::{ProcessError, SchemaError, VersionError};
use crate::validator;
use crate::version::{Version, VersionDef, VersionSetDef};

/// Ordered collection of prepared versions; pure lookup after registration.
#[derive(Default)]
pub struct VersionRegistry {
    versions: Vec<Version>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prepared version, keeping the collection sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::NotPrepared` for an unprepared version: the
    /// registry only serves versions whose artifacts exist.
    pub fn register(&mut self, version: Version) -> Result<(), SchemaError> {
        if !version.is_prepared() {
            return Err(SchemaError::NotPrepared {
                version: version.name().to_string(),
            });
        }
        self.versions.retain(|v| v.name() != version.name());
        let index = self
            .versions
            .partition_point(|v| v.name() < version.name());
        self.versions.insert(index, version);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.versions.iter().map(|v| v.name()).collect()
    }

    /// Exact lookup by name.
    pub fn get(&self, name: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.name() == name)
    }

    /// The greatest registered version.
    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Resolve a requested version name with the downgrade strategy.
    ///
    /// Exact matches win; otherwise the greatest version `<= requested`
    /// is returned, which also serves requests beyond every registered
    /// name. A request below the earliest version cannot be satisfied.
    pub fn resolve(&self, requested: &str) -> Result<&Version, VersionError> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.name() <= requested)
            .ok_or_else(|| VersionError::NotFound {
                requested: requested.to_string(),
            })
    }

    /// Resolve, optionally validate, and transform a document.
    ///
    /// Validation errors are returned as a structured list, never raised
    /// from inside the transform path.
    pub fn process(
        &self,
        document: &Value,
        version_id: &str,
        validate: bool,
    ) -> Result<Value, ProcessError> {
        let version = self.resolve(version_id)?;
        if validate {
            let errors = validator::check(version.validation_schema()?, document)?;
            if !errors.is_empty() {
                return Err(ProcessError::Invalid { errors });
            }
        }
        Ok(version.transform(document)?)
    }

    /// Build a registry from a declarative version-set definition:
    /// versions are assembled in order (honoring `extends`/`remove`),
    /// prepared, and registered.
    pub fn from_definitions(
        def: &VersionSetDef,
        config: &CompileConfig,
        catalog: &SchemaCatalog,
    ) -> Result<Self, SchemaError> {
        let mut built: Vec<Version> = Vec::with_capacity(def.versions.len());
        for vdef in &def.versions {
            built.push(build_version(vdef, &built)?);
        }
        let mut registry = VersionRegistry::new();
        for mut version in built {
            version.prepare(config, catalog)?;
            registry.register(version)?;
        }
        Ok(registry)
    }
}

fn build_version(def: &VersionDef, earlier: &[Version]) -> Result<Version, SchemaError> {
    let mut version = Version::new(&def.name);
    if let Some(text) = &def.description {
        version = version.with_description(text);
    }
    if let Some(base) = &def.extends {
        let source = earlier
            .iter()
            .find(|v| v.name() == base.as_str())
            .ok_or_else(|| SchemaError::InvalidSchema {
                message: format!("version \"{}\" extends unknown version \"{}\"", def.name, base),
            })?;
        version.copy_from(source, &[])?;
    }
    for name in &def.remove {
        version.remove(name)?;
    }
    for node in &def.properties {
        version.add(node.clone())?;
    }
    Ok(version)
}
