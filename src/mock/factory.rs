//! Mock Template Factory
//!
//! Canned templates for demos and tests of the mock engine.

use serde_json::json;

use crate::workflow::model::{Condition, ConditionOperator, WorkflowStep, WorkflowTemplate};

/// A small project-kickoff flow: brief, two parallel-ish setup steps,
/// then a notification.
pub fn project_kickoff() -> WorkflowTemplate {
    let mut template = WorkflowTemplate::new("Project Kickoff", "1.0", "project");
    template.description = Some("Collects a brief, provisions resources, notifies the team".into());

    let steps = vec![
        WorkflowStep::new("collect_brief", "Collect project brief", "form").with_order(1),
        WorkflowStep::new("create_repo", "Create repository", "provision")
            .with_order(2)
            .depends_on("collect_brief"),
        WorkflowStep::new("create_board", "Create task board", "provision")
            .with_order(3)
            .depends_on("collect_brief"),
        WorkflowStep::new("notify_team", "Notify the team", "email")
            .with_order(4)
            .depends_on("create_repo")
            .depends_on("create_board")
            .with_retries(2),
    ];
    template.steps = steps;
    template
}

/// A linear chain of `count` steps, each depending on the previous one.
pub fn linear_chain(count: usize) -> WorkflowTemplate {
    let mut template = WorkflowTemplate::new(
        format!("Linear Chain ({})", count),
        "1.0",
        "demo",
    );

    for i in 0..count {
        let mut step = WorkflowStep::new(
            format!("step_{}", i),
            format!("Step {}", i),
            "work",
        )
        .with_order(i as i64);
        if i > 0 {
            step = step.depends_on(format!("step_{}", i - 1));
        }
        template.steps.push(step);
    }

    template
}

/// A flow with a conditional approval branch, exercising skip behavior.
pub fn conditional_approval() -> WorkflowTemplate {
    let mut template = WorkflowTemplate::new("Conditional Approval", "1.0", "review");

    template.steps = vec![
        WorkflowStep::new("submit", "Submit request", "form").with_order(1),
        WorkflowStep::new("manager_review", "Manager review", "approval")
            .with_order(2)
            .depends_on("submit")
            .with_condition(Condition::new(
                "requires_approval",
                ConditionOperator::Equals,
                json!(true),
            )),
        WorkflowStep::new("archive", "Archive request", "storage")
            .with_order(3)
            .depends_on("submit"),
    ];
    template
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::validator::validate_template;

    #[test]
    fn test_factory_templates_are_valid() {
        for template in [project_kickoff(), linear_chain(5), conditional_approval()] {
            let report = validate_template(&template);
            assert!(
                report.success(),
                "template '{}' invalid: {:?}",
                template.name,
                report.errors
            );
        }
    }

    #[test]
    fn test_linear_chain_shape() {
        let template = linear_chain(3);
        assert_eq!(template.steps.len(), 3);
        assert!(template.steps[0].dependencies.is_empty());
        assert_eq!(template.steps[2].dependencies, vec!["step_1"]);
    }
}
