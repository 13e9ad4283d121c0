//! Instance validation against the type registry

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChainKind, Error, Result, ValidationError};
use crate::instance::{Category, Instance, ROOT_TYPE};
use crate::registry::{ChainGuard, TypeRegistry};
use crate::schema::{PointerPolicy, ReferenceResolver, SchemaChecker};

/// Validation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateOptions {
    #[serde(default)]
    pub pointers: PointerPolicy,
}

impl ValidateOptions {
    pub fn with_pointers(mut self, pointers: PointerPolicy) -> Self {
        self.pointers = pointers;
        self
    }
}

/// Validates instances against a registry, resolving `pointer_to`
/// constraints through `resolver`
///
/// Purely a function of its inputs. Returns the list of problems found;
/// an empty list means valid. Only a cycle in the type graph is an `Err`.
pub struct Validator<'a> {
    registry: &'a TypeRegistry,
    resolver: &'a dyn ReferenceResolver,
    options: ValidateOptions,
}

impl<'a> Validator<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        resolver: &'a dyn ReferenceResolver,
        options: ValidateOptions,
    ) -> Self {
        Self {
            registry,
            resolver,
            options,
        }
    }

    /// Validate a raw record, normalizing it first
    pub fn validate_record(&self, record: &Value) -> Result<Vec<ValidationError>> {
        match Instance::from_record(record.clone()) {
            Ok(instance) => self.validate(&instance),
            Err(Error::Structural(reason)) => {
                tracing::debug!("Record is not a proper instance: {}", reason);
                Ok(vec![ValidationError::NotAnInstance])
            }
            Err(e) => Err(e),
        }
    }

    pub fn validate(&self, instance: &Instance) -> Result<Vec<ValidationError>> {
        let mut guard = ChainGuard::new(ChainKind::Type);
        self.validate_guarded(instance, &mut guard)
    }

    pub fn is_valid(&self, instance: &Instance) -> Result<bool> {
        Ok(self.validate(instance)?.is_empty())
    }

    fn validate_guarded(
        &self,
        instance: &Instance,
        guard: &mut ChainGuard,
    ) -> Result<Vec<ValidationError>> {
        if instance.check_structure().is_err() {
            return Ok(vec![ValidationError::NotAnInstance]);
        }

        if instance.id() == ROOT_TYPE {
            return Ok(Vec::new());
        }

        // Links carry no declared type; a string `link` target is all they need
        if instance.category() == Category::Link {
            return Ok(Vec::new());
        }

        let type_id = instance.type_id();
        guard.visit(type_id)?;

        let type_is_valid = match self.registry.get(type_id) {
            Some(declaration) => self.validate_guarded(declaration, guard)?.is_empty(),
            None => false,
        };
        if !type_is_valid {
            return Ok(vec![ValidationError::TypeResolution {
                type_id: type_id.to_string(),
            }]);
        }

        let spec = self.registry.merged_spec(type_id)?;
        let required = self.registry.required(type_id)?;

        // An unconstrained type accepts any properties
        if spec.is_empty() && required.is_empty() {
            return Ok(Vec::new());
        }

        let checker = SchemaChecker::new(self.resolver, self.options.pointers);
        Ok(checker.check(instance.properties(), &spec, &required))
    }
}
