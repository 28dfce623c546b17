//! Prompt templates for OpenSCAD generation

/// System instruction shared by every provider on the interactive path
pub const SYSTEM_PROMPT: &str = "You are an expert CAD engineer who writes clear, idiomatic OpenSCAD. \
Respond ONLY with valid, compilable OpenSCAD code - no prose, no markdown fences, no explanations.";

/// Per-request user instruction; `{request}` is replaced verbatim
pub const USER_PROMPT_TEMPLATE: &str = "Create the OpenSCAD code to generate the 3D model for a {request}. \
Answer ONLY with the code, no comments or explanations.";

/// System instruction for CAD-THOUGHTS corpus generation
pub const CAD_THOUGHTS_SYSTEM_PROMPT: &str = "You are an expert CAD engineer. \
For the following design specification, generate an OpenSCAD module and then provide a detailed \
step-by-step chain-of-thought explaining your design decisions. \
Output **only** valid JSON with keys 'code_scad' (string) and 'chain_of_thought' (array of strings).";

/// Build the user instruction for a design request
pub fn user_prompt(design_request: &str) -> String {
    USER_PROMPT_TEMPLATE.replace("{request}", design_request)
}
