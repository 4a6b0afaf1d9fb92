// Lodestar LLM prompt templates.
// All prompts for chat and resume analysis are defined here.

pub const ADVISOR_SYSTEM: &str = "\
You are Lodestar, a pragmatic career advisor for college students. \
Give specific, actionable guidance grounded in the student's profile. \
Prefer concrete next steps (projects, courses, applications) over platitudes. \
Keep answers under 250 words unless the student asks for depth. \
Never invent facts about the student that are not in their profile.";

/// Appended to the advisor system prompt when a profile is available.
pub fn advisor_profile_context(
    full_name: &str,
    degree: Option<&str>,
    graduation_year: Option<i32>,
    target_domain: Option<&str>,
    skills: &[String],
) -> String {
    let mut context = format!("\n\nSTUDENT PROFILE:\nName: {full_name}");
    if let Some(degree) = degree {
        context.push_str(&format!("\nDegree: {degree}"));
    }
    if let Some(year) = graduation_year {
        context.push_str(&format!("\nGraduation year: {year}"));
    }
    if let Some(domain) = target_domain {
        context.push_str(&format!("\nTarget domain: {domain}"));
    }
    if !skills.is_empty() {
        context.push_str(&format!("\nSkills: {}", skills.join(", ")));
    }
    context
}

pub const RESUME_ANALYSIS_SYSTEM: &str = "\
You are a precise resume reviewer for early-career candidates. \
You MUST respond with valid JSON only — no markdown fences, no explanations. \
Score honestly; a typical student resume lands between 40 and 70.";

pub const RESUME_ANALYSIS_PROMPT: &str = r#"Analyze the following resume text and return a JSON object.

RESUME TEXT:
{resume_text}

TARGET DOMAIN (may be empty):
{target_domain}

OUTPUT SCHEMA (return exactly this structure):
{
  "overall_score": number (0-100),
  "summary": "two-sentence overall assessment",
  "strengths": ["string"],
  "gaps": ["string"],
  "suggested_roles": ["string"]
}

Rules:
- strengths and gaps must reference concrete evidence from the resume text.
- suggested_roles must fit the candidate's actual experience level.
- If the text is not a resume, set overall_score to 0 and explain in summary."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_context_includes_known_fields_only() {
        let context = advisor_profile_context(
            "Ada",
            Some("B.Tech CSE"),
            Some(2027),
            None,
            &["rust".to_string(), "sql".to_string()],
        );
        assert!(context.contains("Name: Ada"));
        assert!(context.contains("Degree: B.Tech CSE"));
        assert!(context.contains("Graduation year: 2027"));
        assert!(context.contains("Skills: rust, sql"));
        assert!(!context.contains("Target domain"));
    }

    #[test]
    fn test_resume_prompt_has_placeholders() {
        assert!(RESUME_ANALYSIS_PROMPT.contains("{resume_text}"));
        assert!(RESUME_ANALYSIS_PROMPT.contains("{target_domain}"));
    }
}
