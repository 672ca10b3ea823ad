//! Encryption and editing-restriction tools.
use super::parse;
use crate::common::error::Result;
use crate::ooxml::crypto::{self, ProtectionState};
use crate::ooxml::docx::Package;
use crate::ooxml::docx::settings::{self, ProtectionType};
use crate::store::{PackageStore, Workspace};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct Encrypt {
    filename: String,
    password: String,
    output_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Restrict {
    filename: String,
    #[serde(default = "read_only")]
    restriction: ProtectionType,
    password: Option<String>,
    output_filename: Option<String>,
}

fn read_only() -> ProtectionType {
    ProtectionType::ReadOnly
}

#[derive(Debug, Deserialize)]
struct Unrestrict {
    filename: String,
    password: Option<String>,
    output_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Status {
    filename: String,
}

pub(super) struct ProtectionTools<'a, S> {
    pub(super) workspace: &'a Workspace<S>,
    pub(super) spin_count: u32,
}

impl<S: PackageStore> ProtectionTools<'_, S> {
    pub(super) async fn protect(&self, args: Value) -> Result<Value> {
        let args: Encrypt = parse(args)?;
        let spin_count = self.spin_count;
        let target = self
            .workspace
            .transform(&args.filename, args.output_filename.as_deref(), |bytes| {
                crypto::protect(&bytes, &args.password, spin_count)
            })
            .await?;
        Ok(json!({ "encrypted": true, "target": target }))
    }

    pub(super) async fn unprotect(&self, args: Value) -> Result<Value> {
        let args: Encrypt = parse(args)?;
        let target = self
            .workspace
            .transform(&args.filename, args.output_filename.as_deref(), |bytes| {
                crypto::unprotect(&bytes, &args.password)
            })
            .await?;
        Ok(json!({ "encrypted": false, "target": target }))
    }

    pub(super) async fn restrict(&self, args: Value) -> Result<Value> {
        let args: Restrict = parse(args)?;
        let spin_count = self.spin_count;
        let saved = self
            .workspace
            .edit(&args.filename, args.output_filename.as_deref(), |package| {
                settings::set_editing_restriction(package, args.restriction, args.password.as_deref(), spin_count)
            })
            .await?;
        Ok(json!({
            "restriction": args.restriction,
            "password": args.password.is_some(),
            "target": saved.target,
        }))
    }

    pub(super) async fn unrestrict(&self, args: Value) -> Result<Value> {
        let args: Unrestrict = parse(args)?;
        let saved = self
            .workspace
            .edit(&args.filename, args.output_filename.as_deref(), |package| {
                settings::clear_editing_restriction(package, args.password.as_deref())
            })
            .await?;
        Ok(json!({ "restriction": Value::Null, "target": saved.target }))
    }

    /// Encryption state, plus the editing restriction when the package is readable.
    pub(super) async fn status(&self, args: Value) -> Result<Value> {
        let args: Status = parse(args)?;
        self.workspace
            .read_bytes(&args.filename, |bytes| {
                if crypto::protection_state(bytes) == ProtectionState::PasswordProtected {
                    return Ok(json!({ "encrypted": true, "restriction": Value::Null }));
                }
                let package = Package::from_bytes(bytes)?;
                let restriction = settings::editing_restriction(&package)?;
                Ok(json!({ "encrypted": false, "restriction": restriction }))
            })
            .await
    }
}
