//! Prompt construction for SOAP note generation
//!
//! The system prompt is the contract the response parser relies on: it states
//! the JSON schema verbatim. Bump [`PROMPT_VERSION`] whenever its text changes.

use serde::Serialize;

use crate::context::{ConsultationContext, HistoryEntry, MedicalInfo, VitalSigns};

/// Version of [`SOAP_SYSTEM_PROMPT`]
pub const PROMPT_VERSION: &str = "soap-v1";

/// System instructions for the medical documentation assistant
pub const SOAP_SYSTEM_PROMPT: &str = r#"You are a medical documentation assistant helping physicians create SOAP notes
for a clinic management system. Your role is to generate professional, accurate SOAP notes
based on the provided patient information.

Guidelines:
1. SUBJECTIVE (S): Summarize the chief complaint in clinical language. Include
   relevant history of present illness details if available from patient history.

2. OBJECTIVE (O): Start with vital signs, then describe expected physical
   examination findings based on the chief complaint. Use appropriate medical
   terminology.

3. ASSESSMENT (A): Provide differential diagnoses based on the subjective and
   objective findings. Use hedging language like "likely", "consider", "rule out"
   since you are suggesting, not diagnosing.

4. PLAN (P): Suggest a reasonable treatment plan including:
   - Diagnostic workup if needed
   - Treatment recommendations (AVOID medications the patient is allergic to)
   - Follow-up timeline
   - Patient education points

Important:
- Be concise but comprehensive
- Use standard medical abbreviations appropriately
- This is a DRAFT for physician review - clearly indicate uncertainty
- Consider patient history for context but don't repeat old diagnoses as current
- ALWAYS check patient allergies before suggesting medications
- Consider existing medical conditions and current medications for drug interactions
- Format each section as a clear, readable paragraph or bullet list as appropriate

You MUST respond with a valid JSON object in exactly this format:
{
  "subjective": "...",
  "objective": "...",
  "assessment": "...",
  "plan": "..."
}

Do not include any text outside the JSON object."#;

/// A rendered prompt: one system turn and one user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedPrompt {
    pub system_instructions: String,
    pub user_message: String,
}

/// Render the context into the system instructions and user message
pub fn format_prompt(context: &ConsultationContext) -> FormattedPrompt {
    let user_message = format!(
        r#"Generate SOAP notes for this consultation:

CHIEF COMPLAINT:
{chief_complaint}

VITAL SIGNS:
{vitals}

PATIENT MEDICAL INFORMATION:
{medical_info}

PATIENT HISTORY (recent consultations):
{history}

Generate appropriate SOAP notes based on this information. Remember this is a draft
for physician review - be helpful but indicate uncertainty appropriately.
IMPORTANT: Check allergies before suggesting any medications.

Respond with ONLY a JSON object containing the keys subjective, objective, assessment, plan.
Do not add any text before or after the JSON object."#,
        chief_complaint = context.chief_complaint,
        vitals = format_vitals_section(&context.vital_signs),
        medical_info = format_medical_info_section(&context.patient_medical_info),
        history = format_history_section(&context.patient_history),
    );

    FormattedPrompt {
        system_instructions: SOAP_SYSTEM_PROMPT.to_string(),
        user_message,
    }
}

/// `blood_pressure` -> `Blood Pressure`
fn vital_label(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_vitals_section(vitals: &VitalSigns) -> String {
    let entries = vitals.entries();
    if entries.is_empty() {
        return "No vital signs recorded.".to_string();
    }

    entries
        .iter()
        .map(|(name, value)| format!("- {}: {}", vital_label(name), value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_medical_info_section(info: &MedicalInfo) -> String {
    let mut lines = Vec::new();

    if info.allergies.is_empty() {
        lines.push("- Allergies: None known".to_string());
    } else {
        lines.push(format!("- Allergies: {}", info.allergies.join(", ")));
    }

    if info.medical_conditions.is_empty() {
        lines.push("- Medical Conditions: None known".to_string());
    } else {
        lines.push(format!("- Medical Conditions: {}", info.medical_conditions.join(", ")));
    }

    if info.current_medications.trim().is_empty() {
        lines.push("- Current Medications: None".to_string());
    } else {
        lines.push(format!("- Current Medications: {}", info.current_medications.trim()));
    }

    if !info.blood_type.trim().is_empty() {
        lines.push(format!("- Blood Type: {}", info.blood_type.trim()));
    }

    lines.join("\n")
}

fn format_history_section(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "No previous consultations on record.".to_string();
    }

    history
        .iter()
        .map(|visit| {
            let mut entry = format!("- {}: {}", visit.date, visit.chief_complaint);
            if !visit.diagnosis.is_empty() {
                entry.push_str(&format!(" (Dx: {})", visit.diagnosis));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_system_prompt_states_schema_and_safety_rules() {
        let prompt = format_prompt(&ConsultationContext::default());
        let system = &prompt.system_instructions;

        for key in ["\"subjective\"", "\"objective\"", "\"assessment\"", "\"plan\""] {
            assert!(system.contains(key), "schema key {} missing", key);
        }
        assert!(system.contains("ALWAYS check patient allergies"));
        assert!(system.contains("\"likely\", \"consider\", \"rule out\""));
        assert!(system.contains("DRAFT for physician review"));
    }

    #[test]
    fn test_empty_context_placeholders() {
        let prompt = format_prompt(&ConsultationContext {
            chief_complaint: "dizziness".to_string(),
            ..Default::default()
        });
        let user = &prompt.user_message;

        assert!(user.contains("CHIEF COMPLAINT:\ndizziness"));
        assert!(user.contains("No vital signs recorded."));
        assert!(user.contains("- Allergies: None known"));
        assert!(user.contains("- Medical Conditions: None known"));
        assert!(user.contains("- Current Medications: None"));
        assert!(!user.contains("Blood Type"));
        assert!(user.contains("No previous consultations on record."));
    }

    #[test]
    fn test_vitals_are_labeled() {
        let vitals = VitalSigns {
            blood_pressure: Some("120/80 mmHg".to_string()),
            oxygen_saturation: Some("97%".to_string()),
            ..Default::default()
        };
        let section = format_vitals_section(&vitals);
        assert_eq!(section, "- Blood Pressure: 120/80 mmHg\n- Oxygen Saturation: 97%");
    }

    #[test]
    fn test_medical_info_lists_everything() {
        let info = MedicalInfo {
            allergies: vec!["Penicillin".to_string(), "Latex".to_string()],
            medical_conditions: vec!["Type 2 Diabetes".to_string()],
            current_medications: "Metformin 500mg BID".to_string(),
            blood_type: "O+".to_string(),
        };
        let section = format_medical_info_section(&info);
        assert!(section.contains("- Allergies: Penicillin, Latex"));
        assert!(section.contains("- Medical Conditions: Type 2 Diabetes"));
        assert!(section.contains("- Current Medications: Metformin 500mg BID"));
        assert!(section.contains("- Blood Type: O+"));
    }

    #[test]
    fn test_history_lines() {
        let history = vec![
            HistoryEntry {
                date: NaiveDate::from_ymd_opt(2026, 10, 9).unwrap(),
                chief_complaint: "sore throat".to_string(),
                diagnosis: "Upper Respiratory Infection".to_string(),
                assessment: String::new(),
            },
            HistoryEntry {
                date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                chief_complaint: "annual checkup".to_string(),
                diagnosis: String::new(),
                assessment: String::new(),
            },
        ];
        let section = format_history_section(&history);
        assert_eq!(
            section,
            "- 2026-10-09: sore throat (Dx: Upper Respiratory Infection)\n- 2026-06-01: annual checkup"
        );
    }

    #[test]
    fn test_user_message_demands_json_only() {
        let prompt = format_prompt(&ConsultationContext::default());
        assert!(prompt.user_message.contains("Respond with ONLY a JSON object"));
        assert!(prompt.user_message.contains("Check allergies before suggesting any medications"));
    }

    #[test]
    fn test_vital_label() {
        assert_eq!(vital_label("heart_rate"), "Heart Rate");
        assert_eq!(vital_label("weight"), "Weight");
    }
}
