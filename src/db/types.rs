use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "assignmenttype", rename_all = "lowercase")]
pub(crate) enum AssignmentType {
    #[serde(alias = "quiz")]
    Quiz,
    #[serde(alias = "clinic")]
    Clinic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_type_wire_format_is_uppercase() {
        assert_eq!(serde_json::to_string(&AssignmentType::Quiz).unwrap(), "\"QUIZ\"");
        let parsed: AssignmentType = serde_json::from_str("\"clinic\"").unwrap();
        assert_eq!(parsed, AssignmentType::Clinic);
    }

    #[test]
    fn role_wire_format_is_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Teacher).unwrap(), "\"teacher\"");
        assert!(serde_json::from_str::<UserRole>("\"superuser\"").is_err());
    }
}
