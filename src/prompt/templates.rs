//! Per-kind prompt templates.
//!
//! One generic set of stage templates is shared by code and documents; the
//! kind only changes the vocabulary (nouns, labels and the quality rubric)
//! merged into every render. Any stage body can be replaced by a
//! `<stage>.md` file in a templates directory.

use serde_json::{Map, Value, json};

use super::{PromptLoader, PromptRenderer};
use crate::domain::{ArtifactKind, Stage};
use crate::error::{RefinrError, Result};

/// A rendered prompt ready for the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Words that differ between code and document runs
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub noun: &'static str,
    pub noun_title: &'static str,
    pub domain_label: &'static str,
    pub subject_label: &'static str,
    pub role: &'static str,
    pub rubric: &'static [&'static str],
}

const CODE_RUBRIC: &[&str] = &[
    "Functionality: does it do what the goal asks for",
    "Clarity: clear and readable code",
    "Robustness: proper error handling and sound structure",
    "Efficiency: no needless work",
    "Documentation: well-documented with comments",
    "Alignment: consistent with the interpreted intent",
];

const DOCUMENT_RUBRIC: &[&str] = &[
    "Fit: does it cover what the goal asks for",
    "Clarity: readable, engaging prose",
    "Structure: logical organisation with clear sections",
    "Accuracy: claims are correct and complete",
    "Formatting: consistent headings, lists and style",
    "Alignment: consistent with the interpreted intent",
];

impl Vocabulary {
    pub fn for_kind(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Code => Self {
                noun: "code",
                noun_title: "Code",
                domain_label: "Language",
                subject_label: "Functionality",
                role: "You are an expert software engineer.",
                rubric: CODE_RUBRIC,
            },
            ArtifactKind::Document => Self {
                noun: "document",
                noun_title: "Document",
                domain_label: "Document type",
                subject_label: "Topic",
                role: "You are an expert writer and editor.",
                rubric: DOCUMENT_RUBRIC,
            },
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "noun": self.noun,
            "Noun": self.noun_title,
            "domain_label": self.domain_label,
            "subject_label": self.subject_label,
            "rubric": self.rubric,
        })
    }
}

const INTERPRET: &str = r#"Please interpret the user's intent from the following input and focus area:

Goal: {{goal}}
Focus Area: {{focus_area}}

Provide a concise interpretation of what the user is asking for, including:
- The main goal
- Any specific features or requirements
- The {{domain_label}} (if specified)
- Any constraints or additional context
- How the focus area should be incorporated into the {{noun}}

Your interpretation should explicitly address how the focus area affects the overall intent and desired outcome."#;

const GENERATE: &str = r#"Goal: {{goal}}
Intent Interpretation: {{intent}}
Focus Area: {{focus_area}}
Next Steps: {{next_steps}}

{{domain_label}}: {{domain}}
{{subject_label}}: {{subject}}

Produce the {{noun}} described above. It should have the following characteristics:

{{#each rubric}}- {{this}}
{{/each}}- Special focus on {{focus_area}}

Here is an example of what the {{noun}} might look like:

{{seed}}

Now write the {{noun}}, keeping in mind the desired characteristics, the example provided, the goal, the interpreted intent and the focus area."#;

const EVALUATE: &str = r#"Goal: {{goal}}
Intent Interpretation: {{intent}}
Focus Area: {{focus_area}}

Here is the {{noun}} to evaluate:

{{artifact}}

Evaluate whether the {{noun}} meets the user's requirements and aligns with their intent. Consider:

{{#each rubric}}- {{this}}
{{/each}}- Focus Area: does it adequately address "{{focus_area}}"

Explain your reasoning. Then end your answer with a single JSON object on its own line, exactly one of:
{"meets_requirements": true}
{"meets_requirements": false}"#;

const SUGGEST: &str = r#"Goal: {{goal}}
Intent Interpretation: {{intent}}
Focus Area: {{focus_area}}

Please analyze the following {{noun}}:

{{artifact}}

Provide specific suggestions for improving it in terms of:

{{#each rubric}}- {{this}}
{{/each}}
Also address the focus area: {{focus_area}}

Give each suggestion as a numbered list item. Make them actionable and concrete, with examples where useful."#;

const DISCREPANCY: &str = r#"Original example:
{{seed}}

Generated {{noun}}:
{{artifact}}

Focus Area: {{focus_area}}

Please analyze the two versions above and answer the following questions:

1. Are there any major discrepancies between the original example and the generated {{noun}}?
2. If there are discrepancies, what are they?
3. How can the generated {{noun}} be improved to better align with the original example?
4. Does the generated {{noun}} adequately address the specified focus area?

Provide a detailed analysis and specific suggestions for improvement."#;

const REFINE: &str = r#"Goal: {{goal}}
Intent Interpretation: {{intent}}
Focus Area: {{focus_area}}

Here is the current {{noun}}:

{{artifact}}

And here is the feedback to apply:

{{feedback}}

Revise the {{noun}}, incorporating the feedback while keeping what already works. Implement the suggestions directly. Return the complete revised {{noun}}."#;

const COMPARE: &str = r#"Compare the following versions:

New:
{{new}}

Best:
{{best}}

Previous:
{{previous}}

Focus Area: {{focus_area}}

Provide a detailed analysis of the improvements in the new version compared to the best and previous versions, and how well each addresses the focus area. Indicate which version is the best overall and explain why."#;

const CLEAN: &str = r#"Here is {{noun}} that needs to be cleaned and formatted correctly:

{{artifact}}

Correct any obvious errors and formatting issues. Output the {{noun}} in its entirety inside a single markdown fenced block, and nothing else: no introduction, no explanation, no closing remarks."#;

const AGGREGATE: &str = r#"Compare and analyze the following versions:

Latest (cleaned):
{{latest}}

Initial (cleaned):
{{initial}}

Good enough:
{{good_enough}}

Focus Area: {{focus_area}}

Based on these versions, produce a final {{noun}} that combines the best aspects of each. Put the final {{noun}} in a single markdown fenced block, then give a brief explanation of the choices you made after the block."#;

const NEXT_STEPS: &str = r#"Analyze the following {{noun}} and provide next steps for further improvement:

{{artifact}}

Goal: {{goal}}
Current Focus Area: {{focus_area}}

Suggest specific next steps, considering:
{{#each rubric}}- {{this}}
{{/each}}- Areas that weren't fully addressed in the current focus area

If the {{noun}} has reached a satisfactory state and no further improvements are necessary, explicitly state that there are no more next steps.

Next Steps:"#;

const FOCUS_AREA: &str = r#"Based on the following information:

Goal: {{goal}}
Previous Focus Area: {{previous_focus_area}}
Next Steps: {{next_steps}}

Generate a new focus area for the next round of improvement. It should address the most critical aspects mentioned in the next steps while considering the overall goal. Answer with the focus area only.

New Focus Area:"#;

fn default_body(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Interpret => Some(INTERPRET),
        Stage::Generate => Some(GENERATE),
        Stage::Evaluate => Some(EVALUATE),
        Stage::Suggest => Some(SUGGEST),
        Stage::Discrepancy => Some(DISCREPANCY),
        Stage::Refine => Some(REFINE),
        Stage::Compare => Some(COMPARE),
        Stage::Clean => Some(CLEAN),
        Stage::Aggregate => Some(AGGREGATE),
        Stage::NextSteps => Some(NEXT_STEPS),
        Stage::FocusArea => Some(FOCUS_AREA),
        Stage::Persist => None,
    }
}

fn system_instruction(stage: Stage) -> &'static str {
    match stage {
        Stage::Interpret => "Interpret requests precisely and concisely.",
        Stage::Generate | Stage::Refine => "Return the complete artifact.",
        Stage::Evaluate => "Judge strictly and always end with the requested JSON verdict.",
        Stage::Suggest | Stage::Discrepancy | Stage::Compare => "Give specific, actionable analysis.",
        Stage::Clean | Stage::Aggregate => "Follow the output format exactly.",
        Stage::NextSteps | Stage::FocusArea => "Plan the next round of improvement.",
        Stage::Persist => "",
    }
}

/// Stage templates for one artifact kind
pub struct TemplateSet {
    kind: ArtifactKind,
    vocabulary: Vocabulary,
    renderer: PromptRenderer,
}

impl TemplateSet {
    /// Built-in templates for `kind`
    pub fn for_kind(kind: ArtifactKind) -> Result<Self> {
        let mut renderer = PromptRenderer::new();
        for stage in Stage::PROMPTED {
            if let Some(body) = default_body(stage) {
                renderer.register_template(stage.as_str(), body)?;
            }
        }
        Ok(Self {
            kind,
            vocabulary: Vocabulary::for_kind(kind),
            renderer,
        })
    }

    /// Replace the body for every stage that has a `<stage>.md` file
    pub fn with_overrides(mut self, loader: &PromptLoader) -> Result<Self> {
        for stage in Stage::PROMPTED {
            if let Some(body) = loader.load_optional(stage.as_str())? {
                log::info!("Using template override for {} from {:?}", stage, loader.templates_dir());
                self.override_stage(stage, &body)?;
            }
        }
        Ok(self)
    }

    pub fn override_stage(&mut self, stage: Stage, body: &str) -> Result<()> {
        self.renderer.register_template(stage.as_str(), body)
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Render `stage` with `vars` merged over the kind's vocabulary
    pub fn render(&self, stage: Stage, vars: Value) -> Result<Prompt> {
        let mut context = match self.vocabulary.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        match vars {
            Value::Object(map) => context.extend(map),
            Value::Null => {}
            other => {
                return Err(RefinrError::Template(format!(
                    "template variables for {} must be an object, got {}",
                    stage, other
                )));
            }
        }

        let user = self.renderer.render_named(stage.as_str(), &Value::Object(context))?;
        let system = format!("{} {}", self.vocabulary.role, system_instruction(stage))
            .trim()
            .to_string();
        Ok(Prompt { system, user })
    }
}
