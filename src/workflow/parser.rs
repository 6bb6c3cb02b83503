//! Template Parser
//!
//! Handles loading workflow templates from YAML or JSON files and the
//! JSON export/import representation used by the service layer.

use std::error::Error;
use std::fs;

use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use super::model::WorkflowTemplate;
use super::validator::validate_template;

/// Loads a workflow template from a YAML or JSON file.
///
/// This function:
/// 1. Reads the file (format chosen by extension; `.json` parses as JSON,
///    everything else as YAML)
/// 2. Parses it into a [`WorkflowTemplate`]
/// 3. Validates the template structure
///
/// # Arguments
///
/// * `path` - Path to the template file
///
/// # Returns
///
/// * `Ok(WorkflowTemplate)` - Successfully loaded and validated template
/// * `Err` - Read, parse or validation error
///
/// # Example
///
/// ```rust,no_run
/// use flowrunner::workflow::load_template;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let template = load_template("kickoff.yaml")?;
///     println!("Loaded {} steps", template.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_template(path: &str) -> Result<WorkflowTemplate, Box<dyn Error>> {
    info!("Loading template from: {}", path);

    let content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read template file '{}': {}. Check that the file exists and is readable.",
            path, e
        )
    })?;

    debug!("Template file loaded ({} bytes)", content.len());

    let template: WorkflowTemplate = if path.ends_with(".json") {
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse template JSON: {}. Check the file format.", e))?
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse template YAML: {}. Check the file format.", e))?
    };

    info!(
        "Parsed template '{}' with {} steps",
        template.name,
        template.steps.len()
    );

    let report = validate_template(&template);
    if !report.success() {
        return Err(format!(
            "Template '{}' failed validation: {}",
            template.name,
            report.error_messages().join("; ")
        )
        .into());
    }
    for warning in report.warning_messages() {
        log::warn!("{}", warning);
    }

    Ok(template)
}

/// Saves a template to a YAML file.
pub fn save_template(template: &WorkflowTemplate, path: &str) -> Result<(), Box<dyn Error>> {
    let yaml_content = serde_yaml::to_string(template)?;
    fs::write(path, yaml_content)?;
    info!("Template saved to: {}", path);
    Ok(())
}

/// Serializes a template to its portable JSON export form.
pub fn export_json(template: &WorkflowTemplate) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(template)
}

/// Parses an exported template, assigning a fresh id and marking the
/// name so imported copies are distinguishable from originals.
pub fn import_json(data: &str) -> Result<WorkflowTemplate, serde_json::Error> {
    let mut template: WorkflowTemplate = serde_json::from_str(data)?;
    template.id = Uuid::new_v4().to_string();
    template.name = format!("{} (Imported)", template.name);
    let now = Utc::now();
    template.created_at = now;
    template.updated_at = now;
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::WorkflowStep;
    use tempfile::tempdir;

    fn sample_template() -> WorkflowTemplate {
        let mut template = WorkflowTemplate::new("Sample", "1.0", "project");
        template
            .add_step(WorkflowStep::new("a", "A", "echo"))
            .unwrap();
        template
            .add_step(WorkflowStep::new("b", "B", "echo").depends_on("a"))
            .unwrap();
        template
    }

    #[test]
    fn test_load_template_file_not_found() {
        let result = load_template("/nonexistent/path/template.yaml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_template_valid_yaml() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("template.yaml");

        let yaml = r#"
name: Onboarding
version: "1.0"
template_type: project
steps:
  - step_id: collect
    name: Collect brief
    handler: echo
  - step_id: notify
    name: Notify team
    handler: echo
    dependencies:
      - collect
"#;
        std::fs::write(&path, yaml).unwrap();

        let template = load_template(path.to_str().unwrap()).unwrap();
        assert_eq!(template.name, "Onboarding");
        assert_eq!(template.steps.len(), 2);
        assert_eq!(template.steps[1].dependencies, vec!["collect"]);
    }

    #[test]
    fn test_load_template_valid_json() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("template.json");

        let json = serde_json::to_string(&sample_template()).unwrap();
        std::fs::write(&path, json).unwrap();

        let template = load_template(path.to_str().unwrap()).unwrap();
        assert_eq!(template.name, "Sample");
    }

    #[test]
    fn test_load_template_invalid_yaml() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.yaml");
        std::fs::write(&path, "this is not a template: [[[").unwrap();

        assert!(load_template(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_load_template_rejects_invalid_structure() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("cyclic.yaml");

        // a <-> b cycle must be rejected at load time
        let yaml = r#"
name: Cyclic
version: "1.0"
template_type: project
steps:
  - step_id: a
    name: A
    handler: echo
    dependencies: [b]
  - step_id: b
    name: B
    handler: echo
    dependencies: [a]
"#;
        std::fs::write(&path, yaml).unwrap();

        let err = load_template(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Circular dependency"));
    }

    #[test]
    fn test_save_template() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("out.yaml");

        save_template(&sample_template(), path.to_str().unwrap()).unwrap();
        assert!(path.exists());

        let reloaded = load_template(path.to_str().unwrap()).unwrap();
        assert_eq!(reloaded.steps.len(), 2);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let original = sample_template();
        let exported = export_json(&original).unwrap();
        let imported = import_json(&exported).unwrap();

        assert_ne!(imported.id, original.id);
        assert_eq!(imported.name, "Sample (Imported)");
        assert_eq!(imported.steps, original.steps);
        assert_eq!(imported.version, original.version);
    }
}
