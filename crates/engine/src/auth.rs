//! Caller identity as supplied by the authentication layer.

use std::fmt;

use common::UserId;
use serde::{Deserialize, Serialize};

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Customer,
    Worker,
    SuperAdmin,
}

impl Role {
    /// Returns true for fulfillment and admin roles.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Worker | Role::SuperAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "Customer",
            Role::Worker => "Worker",
            Role::SuperAdmin => "SuperAdmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "worker" => Ok(Role::Worker),
            "superadmin" | "super_admin" => Ok(Role::SuperAdmin),
            _ => Err(format!("unknown role '{s}'")),
        }
    }
}

/// The authenticated caller of an engine operation.
///
/// The engine trusts this identity and performs no credential checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn customer(user_id: UserId) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn worker(user_id: UserId) -> Self {
        Self::new(user_id, Role::Worker)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Staff may act on anyone's orders; customers only on their own.
    pub fn can_act_for(&self, owner: UserId) -> bool {
        self.is_staff() || self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_roles() {
        assert!(!Role::Customer.is_staff());
        assert!(Role::Worker.is_staff());
        assert!(Role::SuperAdmin.is_staff());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("worker".parse::<Role>().unwrap(), Role::Worker);
        assert_eq!("SuperAdmin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_ownership() {
        let owner = UserId::new();
        assert!(Actor::customer(owner).can_act_for(owner));
        assert!(!Actor::customer(UserId::new()).can_act_for(owner));
        assert!(Actor::worker(UserId::new()).can_act_for(owner));
    }
}
