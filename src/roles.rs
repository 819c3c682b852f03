//! Role-based module visibility.
//!
//! Roles and modules are closed sets. Each module declares the roles allowed
//! to open it; the sidebar and the CLI both go through [`Role::can_access`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    SuperAdministrador,
    Administrador,
    Usuario,
    JefeDeProduccion,
    Gerencia,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdministrador,
        Role::Administrador,
        Role::Usuario,
        Role::JefeDeProduccion,
        Role::Gerencia,
    ];

    /// Name as stored in the user profile table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdministrador => "SuperAdministrador",
            Self::Administrador => "Administrador",
            Self::Usuario => "Usuario",
            Self::JefeDeProduccion => "Jefe de Produccion",
            Self::Gerencia => "Gerencia",
        }
    }

    pub fn can_access(&self, module: Module) -> bool {
        module.allowed_roles().contains(self)
    }

    /// Modules shown in this role's sidebar, in sidebar order.
    pub fn visible_modules(&self) -> Vec<Module> {
        Module::ALL
            .into_iter()
            .filter(|m| self.can_access(*m))
            .collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive; spaces and an accent on "Producción" are tolerated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .replace('ó', "o")
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect();
        match normalized.as_str() {
            "superadministrador" => Ok(Self::SuperAdministrador),
            "administrador" => Ok(Self::Administrador),
            "usuario" => Ok(Self::Usuario),
            "jefedeproduccion" => Ok(Self::JefeDeProduccion),
            "gerencia" => Ok(Self::Gerencia),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Module {
    Dashboard,
    Planning,
    Engineering,
    Scheduling,
    Inventory,
    ShopFloor,
    Costing,
    Administration,
}

impl Module {
    pub const ALL: [Module; 8] = [
        Module::Dashboard,
        Module::Planning,
        Module::Engineering,
        Module::Scheduling,
        Module::Inventory,
        Module::ShopFloor,
        Module::Costing,
        Module::Administration,
    ];

    pub fn allowed_roles(&self) -> &'static [Role] {
        use Role::*;
        match self {
            Module::Dashboard => &[
                SuperAdministrador,
                Administrador,
                Usuario,
                JefeDeProduccion,
                Gerencia,
            ],
            Module::Planning => &[
                SuperAdministrador,
                Administrador,
                JefeDeProduccion,
                Gerencia,
            ],
            Module::Engineering => &[SuperAdministrador, Administrador, JefeDeProduccion],
            Module::Scheduling => &[SuperAdministrador, Administrador, JefeDeProduccion],
            Module::Inventory => &[
                SuperAdministrador,
                Administrador,
                JefeDeProduccion,
                Gerencia,
            ],
            Module::ShopFloor => &[
                SuperAdministrador,
                Administrador,
                Usuario,
                JefeDeProduccion,
            ],
            Module::Costing => &[SuperAdministrador, Administrador, Gerencia],
            Module::Administration => &[SuperAdministrador],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Module::Dashboard => "Dashboard",
            Module::Planning => "Planning",
            Module::Engineering => "Engineering",
            Module::Scheduling => "Scheduling",
            Module::Inventory => "Inventory",
            Module::ShopFloor => "Shop floor",
            Module::Costing => "Costing",
            Module::Administration => "Administration",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
