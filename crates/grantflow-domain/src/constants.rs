//! Enums de lookup compartidos por todo el motor.
//!
//! Se serializan como strings snake_case tanto en JSON (serde) como en las
//! columnas Text de Postgres (`as_str` / `FromStr`), para que el contenido
//! de la base sea legible y estable entre versiones.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

macro_rules! lookup_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(DomainError::UnknownLookupValue {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

lookup_enum! {
    /// Tipos de workflow registrables. Cada variante corresponde a una
    /// entrada del `WorkflowRegistry` cargada en el arranque.
    WorkflowType {
        InitialPrototype => "initial_prototype",
        OpportunityPublish => "opportunity_publish",
    }
}

lookup_enum! {
    /// Tipo de entidad de negocio a la que puede ligarse un workflow.
    WorkflowEntityType {
        Opportunity => "opportunity",
        Application => "application",
        ApplicationSubmission => "application_submission",
    }
}

lookup_enum! {
    /// Tipo de aprobación que un evento guardado puede requerir.
    ApprovalType {
        ProgramOfficerApproval => "program_officer_approval",
        BudgetOfficerApproval => "budget_officer_approval",
    }
}

lookup_enum! {
    /// Respuesta rendida por un aprobador durante una transición.
    ApprovalResponseType {
        Approved => "approved",
        Declined => "declined",
        RequiresModification => "requires_modification",
    }
}

lookup_enum! {
    /// Privilegio organizacional asignado a un usuario dentro de una agencia.
    Privilege {
        ProgramOfficerApproval => "program_officer_approval",
        BudgetOfficerApproval => "budget_officer_approval",
    }
}
