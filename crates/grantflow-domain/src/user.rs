//! Registros de directorio: usuarios.
//!
//! El motor no es dueño de estos datos; los consulta a través del trait
//! `Directory` de grantflow-core. Aquí sólo vive la shape. Las agencias se
//! referencian por `agency_code` (el string que cuelga de la opportunity);
//! el motor nunca necesita la fila de agencia completa.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

impl User {
    pub fn new(email: &str) -> Self {
        Self { user_id: Uuid::new_v4(),
               email: email.to_string() }
    }
}
