//! User-facing message catalog.

pub struct Messages;

const FALLBACK: &str = "An error occurred.";

impl Messages {
    /// Message for `key`, or the generic error message for unknown keys.
    pub fn get(key: &str) -> &'static str {
        match key {
            "success" => "Operation completed successfully.",
            "error" => FALLBACK,

            "upload_success" => "File uploaded successfully.",
            "upload_error" => "The file could not be uploaded.",
            "file_too_large" => "The file is too large.",
            "file_type_not_allowed" => "This file type is not allowed.",
            "file_not_found" => "File not found.",

            "login_failed" => "Invalid credentials.",
            "login_success" => "Signed in.",
            "logout_success" => "Signed out.",

            "create_success" => "Record added.",
            "update_success" => "Record updated.",
            "delete_success" => "Record deleted.",
            "crud_error" => "The operation failed.",

            "db_connection_error" => "Could not connect to the database.",
            "db_query_error" => "The database query failed.",

            "validation_error" => "Invalid data.",
            "required_field" => "This field is required.",
            "invalid_email" => "Invalid email address.",
            _ => FALLBACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_falls_back_to_error() {
        assert_eq!(Messages::get("no_such_key"), Messages::get("error"));
        assert_ne!(Messages::get("upload_success"), Messages::get("error"));
    }
}
