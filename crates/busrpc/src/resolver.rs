//! # Contract Resolver
//!
//! Finds the contract for a type. Lookup order: the type itself, then the
//! capabilities it declares (in declaration order, one level deep), then
//! the same search on its parent.

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::contract::Contract;
use crate::error::Error;
use crate::error::Result;

#[derive(Default)]
pub struct Resolver {
    contracts: HashMap<TypeId, Arc<Contract>>,
    capabilities: HashMap<TypeId, Vec<TypeId>>,
    parents: HashMap<TypeId, TypeId>,
    resolved: DashMap<TypeId, Arc<Contract>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("contracts", &self.contracts.len())
            .field("capabilities", &self.capabilities.len())
            .field("parents", &self.parents.len())
            .finish()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn learn<T: ?Sized + 'static>(&mut self) -> TypeId {
        self.resolved.clear();
        TypeId::of::<T>()
    }

    /// Attaches `contract` to `T`, usually a service trait object such as `dyn Calculator`.
    pub fn declare<T: ?Sized + 'static>(&mut self, contract: Arc<Contract>) -> &mut Self {
        let id = self.learn::<T>();
        self.contracts.insert(id, contract);
        self
    }

    /// Appends `I` to the capabilities `T` declares.
    pub fn implements<T: ?Sized + 'static, I: ?Sized + 'static>(&mut self) -> &mut Self {
        let id = self.learn::<T>();
        let capability = self.learn::<I>();
        let list = self.capabilities.entry(id).or_default();
        if !list.contains(&capability) {
            list.push(capability);
        }
        self
    }

    /// Records `P` as the parent of `T`.
    pub fn extends<T: ?Sized + 'static, P: ?Sized + 'static>(&mut self) -> &mut Self {
        let id = self.learn::<T>();
        let parent = self.learn::<P>();
        self.parents.insert(id, parent);
        self
    }

    /// Finds the contract for `T`.
    ///
    /// # Errors
    /// `Error::Configuration` naming `T` if nothing along the search carries a contract.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Arc<Contract>> {
        let id = TypeId::of::<T>();
        if let Some(found) = self.resolved.get(&id) {
            return Ok(found.clone());
        }

        let mut visited = HashSet::new();
        let mut current = Some(id);
        while let Some(ty) = current {
            if !visited.insert(ty) {
                break;
            }
            if let Some(contract) = self.search(ty) {
                self.resolved.insert(id, contract.clone());
                return Ok(contract);
            }
            current = self.parents.get(&ty).copied();
        }

        Err(Error::Configuration(format!(
            "no contract declared for {} or its capabilities and parents",
            std::any::type_name::<T>()
        )))
    }

    fn search(&self, ty: TypeId) -> Option<Arc<Contract>> {
        if let Some(contract) = self.contracts.get(&ty) {
            return Some(contract.clone());
        }
        self.capabilities
            .get(&ty)?
            .iter()
            .find_map(|capability| self.contracts.get(capability).cloned())
    }
}
