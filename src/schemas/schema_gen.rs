use std::{fs, path::Path};

use schemars::{JsonSchema, schema_for};
use tracing::info;

use crate::utils::errors::{EmptyResult, ResultWithError};

pub struct SchemaGen {}

impl SchemaGen {
    pub fn new() -> Self {
        Self {}
    }

    /// Writes the manifest schema to `output`, or prints it when no path is given.
    pub fn execute(&self, output: Option<&Path>) -> EmptyResult {
        let schema = Self::render::<crate::models::manifest::ManifestFile>()?;

        let Some(path) = output else {
            println!("{schema}");
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, schema)?;
        info!("✅ Schema generated successfully at {}", path.display());
        Ok(())
    }

    /// Pretty-printed JSON schema for `T`.
    fn render<T>() -> ResultWithError<String>
    where
        T: JsonSchema,
    {
        let schema = schema_for!(T);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}
