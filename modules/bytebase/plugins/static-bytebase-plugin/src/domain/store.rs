//! In-memory tables and the lifecycle rules shared by every collection.

use std::collections::BTreeMap;

use bytebase_sdk::models::{
    Database, DatabaseCatalog, DatabaseGroup, Environment, Group, IamPolicy, Instance, Policy,
    Project, ReviewConfig, Risk, Role, Setting, State, User,
};
use bytebase_sdk::{BytebaseError, Collection, FieldMask, Patch, ResourceName};

/// One table per collection, keyed by full resource name.
#[derive(Debug, Default)]
pub struct Store {
    pub(crate) environments: BTreeMap<ResourceName, Environment>,
    pub(crate) instances: BTreeMap<ResourceName, Instance>,
    pub(crate) databases: BTreeMap<ResourceName, Database>,
    pub(crate) catalogs: BTreeMap<ResourceName, DatabaseCatalog>,
    pub(crate) projects: BTreeMap<ResourceName, Project>,
    pub(crate) project_iam: BTreeMap<ResourceName, IamPolicy>,
    pub(crate) database_groups: BTreeMap<ResourceName, DatabaseGroup>,
    pub(crate) users: BTreeMap<ResourceName, User>,
    pub(crate) groups: BTreeMap<ResourceName, Group>,
    pub(crate) roles: BTreeMap<ResourceName, Role>,
    pub(crate) policies: BTreeMap<ResourceName, Policy>,
    pub(crate) settings: BTreeMap<ResourceName, Setting>,
    pub(crate) review_configs: BTreeMap<ResourceName, ReviewConfig>,
    pub(crate) risks: BTreeMap<ResourceName, Risk>,
    pub(crate) workspace_iam: IamPolicy,
}

/// A stored entity with a name and a lifecycle state.
pub trait Record: Clone {
    const COLLECTION: Collection;

    fn table(store: &Store) -> &BTreeMap<ResourceName, Self>;
    fn table_mut(store: &mut Store) -> &mut BTreeMap<ResourceName, Self>;
    fn name(&self) -> &ResourceName;
    fn state(&self) -> State;
    fn set_state(&mut self, state: State);
}

macro_rules! record {
    ($ty:ty, $table:ident, $collection:ident) => {
        impl Record for $ty {
            const COLLECTION: Collection = Collection::$collection;

            fn table(store: &Store) -> &BTreeMap<ResourceName, Self> {
                &store.$table
            }

            fn table_mut(store: &mut Store) -> &mut BTreeMap<ResourceName, Self> {
                &mut store.$table
            }

            fn name(&self) -> &ResourceName {
                &self.name
            }

            fn state(&self) -> State {
                self.state
            }

            fn set_state(&mut self, state: State) {
                self.state = state;
            }
        }
    };
}

record!(Environment, environments, Environments);
record!(Instance, instances, Instances);
record!(Database, databases, Databases);
record!(Project, projects, Projects);
record!(DatabaseGroup, database_groups, DatabaseGroups);
record!(User, users, Users);
record!(Group, groups, Groups);
record!(Role, roles, Roles);
record!(Policy, policies, Policies);
record!(Setting, settings, Settings);
record!(ReviewConfig, review_configs, ReviewConfigs);
record!(Risk, risks, Risks);

fn not_found(name: &ResourceName) -> BytebaseError {
    BytebaseError::not_found(format!("'{name}' not found"))
}

impl Store {
    /// # Errors
    /// `NotFound` when nothing is stored under `name`.
    pub fn get<T: Record>(&self, name: &ResourceName) -> Result<&T, BytebaseError> {
        T::table(self).get(name).ok_or_else(|| not_found(name))
    }

    /// Like [`Store::get`], but a deleted record is a `FailedPrecondition`.
    ///
    /// # Errors
    /// `NotFound` or `FailedPrecondition`.
    pub fn get_active<T: Record>(&self, name: &ResourceName) -> Result<&T, BytebaseError> {
        let record = self.get::<T>(name)?;
        if !record.state().is_active() {
            return Err(BytebaseError::failed_precondition(format!(
                "'{name}' is deleted"
            )));
        }
        Ok(record)
    }

    #[must_use]
    pub fn contains<T: Record>(&self, name: &ResourceName) -> bool {
        T::table(self).contains_key(name)
    }

    /// Records in name order.
    #[must_use]
    pub fn scan<'a, T: Record + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        T::table(self).values()
    }

    /// Insert a record under a fresh name. Deleted records still hold
    /// their name.
    ///
    /// # Errors
    /// `AlreadyExists` when the name is taken.
    pub fn insert<T: Record>(&mut self, record: T) -> Result<T, BytebaseError> {
        let table = T::table_mut(self);
        if table.contains_key(record.name()) {
            return Err(BytebaseError::already_exists(format!(
                "'{}' already exists",
                record.name()
            )));
        }
        table.insert(record.name().clone(), record.clone());
        Ok(record)
    }

    /// Insert or overwrite.
    pub fn put<T: Record>(&mut self, record: T) {
        T::table_mut(self).insert(record.name().clone(), record);
    }

    /// Apply `patch` under `mask` to an active record.
    ///
    /// # Errors
    /// `InvalidArgument` for a bad mask, `NotFound`, or
    /// `FailedPrecondition` for a deleted record.
    pub fn patch<P>(
        &mut self,
        name: &ResourceName,
        patch: &P,
        mask: &FieldMask,
    ) -> Result<P::Target, BytebaseError>
    where
        P: Patch,
        P::Target: Record,
    {
        mask.validate(patch)?;
        self.get_active::<P::Target>(name)?;
        let record = P::Target::table_mut(self)
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;
        patch.apply(mask, record);
        Ok(record.clone())
    }

    /// Soft-delete, or remove for collections without undelete.
    ///
    /// # Errors
    /// `NotFound`, or `FailedPrecondition` when already deleted.
    pub fn delete<T: Record>(&mut self, name: &ResourceName) -> Result<(), BytebaseError> {
        if T::COLLECTION.hard_delete() {
            return T::table_mut(self)
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| not_found(name));
        }
        self.get_active::<T>(name)?;
        if let Some(record) = T::table_mut(self).get_mut(name) {
            record.set_state(State::Deleted);
        }
        Ok(())
    }

    /// # Errors
    /// `NotFound`, or `FailedPrecondition` when the record is active or the
    /// collection has no undelete.
    pub fn undelete<T: Record>(&mut self, name: &ResourceName) -> Result<T, BytebaseError> {
        if T::COLLECTION.hard_delete() {
            return Err(BytebaseError::failed_precondition(format!(
                "{} cannot be undeleted",
                T::COLLECTION
            )));
        }
        let record = T::table_mut(self)
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;
        if record.state().is_active() {
            return Err(BytebaseError::failed_precondition(format!(
                "'{name}' is not deleted"
            )));
        }
        record.set_state(State::Active);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytebase_sdk::ErrorKind;
    use bytebase_sdk::models::{EnvironmentPatch, EnvironmentTier, RoleType};

    fn env(id: &str) -> Environment {
        Environment {
            name: ResourceName::environment(id).unwrap(),
            state: State::Active,
            title: id.to_owned(),
            order: 0,
            tier: EnvironmentTier::Unprotected,
        }
    }

    #[test]
    fn soft_delete_round_trip_is_monotonic() {
        let mut store = Store::default();
        let name = store.insert(env("prod")).unwrap().name;

        store.delete::<Environment>(&name).unwrap();
        assert_eq!(store.get::<Environment>(&name).unwrap().state, State::Deleted);
        assert_eq!(
            store.delete::<Environment>(&name).unwrap_err().kind(),
            ErrorKind::FailedPrecondition
        );

        assert_eq!(store.undelete::<Environment>(&name).unwrap().state, State::Active);
        assert_eq!(
            store.undelete::<Environment>(&name).unwrap_err().kind(),
            ErrorKind::FailedPrecondition
        );
    }

    #[test]
    fn deleted_names_stay_taken() {
        let mut store = Store::default();
        let name = store.insert(env("prod")).unwrap().name;
        store.delete::<Environment>(&name).unwrap();
        assert_eq!(
            store.insert(env("prod")).unwrap_err().kind(),
            ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn hard_delete_removes_the_record() {
        let mut store = Store::default();
        let role = Role {
            name: ResourceName::role("auditor").unwrap(),
            state: State::Active,
            title: "Auditor".to_owned(),
            description: String::new(),
            permissions: Vec::new(),
            kind: RoleType::Custom,
        };
        let name = store.insert(role).unwrap().name;
        store.delete::<Role>(&name).unwrap();
        assert!(!store.contains::<Role>(&name));
        assert_eq!(
            store.delete::<Role>(&name).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn patch_touches_only_masked_fields() {
        let mut store = Store::default();
        let name = store.insert(env("prod")).unwrap().name;
        let patch = EnvironmentPatch {
            title: Some("Production".to_owned()),
            order: Some(9),
            ..EnvironmentPatch::default()
        };
        let updated = store
            .patch(&name, &patch, &FieldMask::from_paths(["title"]).unwrap())
            .unwrap();
        assert_eq!(updated.title, "Production");
        assert_eq!(updated.order, 0);
    }

    #[test]
    fn deleted_records_cannot_be_patched() {
        let mut store = Store::default();
        let name = store.insert(env("prod")).unwrap().name;
        store.delete::<Environment>(&name).unwrap();
        let patch = EnvironmentPatch {
            order: Some(1),
            ..EnvironmentPatch::default()
        };
        let err = store
            .patch(&name, &patch, &FieldMask::from_paths(["order"]).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }
}
