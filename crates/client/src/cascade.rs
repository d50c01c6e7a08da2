//! Business-unit options for the dependent select.
//!
//! When a form holds a business unit that is not in the cached list of the
//! selected client (a unit the list endpoint no longer returns, or a list
//! that has not arrived yet), the unit is looked up by name elsewhere and
//! prepended to the list shown. The cache itself is never touched.

use std::collections::BTreeMap;

use console_core::{AdminUser, BusinessUnitId, BusinessUnitOption, ClientId};

/// Where a missing business-unit name may be found, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct BusinessUnitLookup<'a> {
    pub selected_user: Option<&'a AdminUser>,
    pub bulk_users: &'a [AdminUser],
    pub cached_by_client: &'a BTreeMap<ClientId, Vec<BusinessUnitOption>>,
}

impl<'a> BusinessUnitLookup<'a> {
    /// Name of `id` from the selected user, then the bulk user list, then
    /// any client's cached list.
    ///
    /// A blank name does not count as found; the search moves on.
    pub fn name_of(&self, id: &BusinessUnitId) -> Option<String> {
        let from_user = |user: &AdminUser| {
            user.business_unit_name(id)
                .filter(|name| !name.trim().is_empty())
                .map(str::to_string)
        };

        self.selected_user
            .and_then(from_user)
            .or_else(|| self.bulk_users.iter().find_map(from_user))
            .or_else(|| {
                self.cached_by_client
                    .values()
                    .flatten()
                    .find(|bu| &bu.id == id && !bu.name.trim().is_empty())
                    .map(|bu| bu.name.clone())
            })
    }
}

/// Options to show for the business-unit select.
///
/// `cached` is returned as-is unless `selected` is set, absent from it, and
/// resolvable by name; then that unit is prepended.
pub fn resolve_business_unit_options(
    selected: Option<&BusinessUnitId>,
    cached: &[BusinessUnitOption],
    lookup: &BusinessUnitLookup<'_>,
) -> Vec<BusinessUnitOption> {
    let Some(selected) = selected.filter(|id| !id.is_empty()) else {
        return cached.to_vec();
    };

    if cached.iter().any(|bu| &bu.id == selected) {
        return cached.to_vec();
    }

    match lookup.name_of(selected) {
        Some(name) => {
            let mut options = Vec::with_capacity(cached.len() + 1);
            options.push(BusinessUnitOption::new(selected.clone(), name));
            options.extend_from_slice(cached);
            options
        }
        None => cached.to_vec(),
    }
}
