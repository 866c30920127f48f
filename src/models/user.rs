use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of identity held in the directory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    Patient,
    Doctor,
    Nurse,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Patient => "PATIENT",
            UserType::Doctor => "DOCTOR",
            UserType::Nurse => "NURSE",
            UserType::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single directory entry (patient, clinician or administrator).
///
/// The credential secret is accepted on input but never serialized outward.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique identifier; assigned on add when left empty
    #[serde(rename = "user_id", default)]
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    /// ISO date string (YYYY-MM-DD)
    #[serde(rename = "dob")]
    pub date_of_birth: String,
    pub address: String,
    pub age: u32,
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub gender: String,
    pub contact_info: String,
    /// Login name, unique within the directory
    pub username: String,
    #[serde(rename = "password", default, skip_serializing)]
    pub credential_secret: String,
}

impl User {
    /// Generate a fresh identifier prefixed by the user type, e.g. `PATIENT-<uuid>`
    pub fn generate_id(user_type: UserType) -> String {
        format!("{}-{}", user_type.as_str(), Uuid::new_v4())
    }

    /// Audit resource path for this record
    pub fn resource(&self) -> String {
        resource_for(&self.id)
    }
}

/// Audit resource path for a record identifier
pub fn resource_for(id: &str) -> String {
    format!("user/{}", id)
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("date_of_birth", &self.date_of_birth)
            .field("address", &self.address)
            .field("age", &self.age)
            .field("user_type", &self.user_type)
            .field("gender", &self.gender)
            .field("contact_info", &self.contact_info)
            .field("username", &self.username)
            .field("credential_secret", &"[REDACTED]")
            .finish()
    }
}

/// Sample identities loaded at startup when seeding is enabled
pub fn sample_users() -> Vec<User> {
    vec![
        sample(
            "PATIENT-001",
            "John Doe",
            "1980-01-01",
            "123 Main St",
            44,
            UserType::Patient,
            "M",
            "555-1234",
            "johndoe",
            "password1",
        ),
        sample(
            "DOCTOR-001",
            "Dr. Alice Smith",
            "1975-05-10",
            "456 Clinic Rd",
            49,
            UserType::Doctor,
            "F",
            "555-5678",
            "alicesmith",
            "password2",
        ),
        sample(
            "NURSE-001",
            "Nurse Bob",
            "1985-09-15",
            "789 Hospital Ave",
            39,
            UserType::Nurse,
            "M",
            "555-9012",
            "nursebob",
            "password3",
        ),
        sample(
            "ADMIN-001",
            "Admin Jane",
            "1970-12-20",
            "101 Admin Blvd",
            54,
            UserType::Admin,
            "F",
            "555-3456",
            "adminjane",
            "adminpass",
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn sample(
    id: &str,
    display_name: &str,
    date_of_birth: &str,
    address: &str,
    age: u32,
    user_type: UserType,
    gender: &str,
    contact_info: &str,
    username: &str,
    credential_secret: &str,
) -> User {
    User {
        id: id.to_string(),
        display_name: display_name.to_string(),
        date_of_birth: date_of_birth.to_string(),
        address: address.to_string(),
        age,
        user_type,
        gender: gender.to_string(),
        contact_info: contact_info.to_string(),
        username: username.to_string(),
        credential_secret: credential_secret.to_string(),
    }
}
