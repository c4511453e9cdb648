//! Instruction text sent with every extraction request.

use crate::model::GenerateRequest;

/// Output budget for one extraction. A long DAR with many paras needs room.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

pub const SYSTEM_PROMPT: &str = "\
You are an expert assistant for extracting structured data from Indian GST \
Draft Audit Reports (DARs).

Read the full report text and produce a single JSON object with exactly this shape:
{
  \"header\": {
    \"audit_group_number\": integer between 1 and 30 or null,
    \"gstin\": \"15-character GSTIN of the audited taxpayer\" or null,
    \"trade_name\": \"trade name of the taxpayer\" or null,
    \"category\": \"Large\" | \"Medium\" | \"Small\" or null,
    \"total_amount_detected_overall_rs\": number in Rupees or null,
    \"total_amount_recovered_overall_rs\": number in Rupees or null
  },
  \"audit_paras\": [
    {
      \"audit_para_number\": integer between 1 and 50 or null,
      \"audit_para_heading\": \"heading of the para, as written\" or null,
      \"revenue_involved_lakhs_rs\": number in Lakhs of Rupees or null,
      \"revenue_recovered_lakhs_rs\": number in Lakhs of Rupees or null
    }
  ],
  \"parsing_errors\": \"short notes on anything you could not find\" or null
}

Rules:
- The header holds report-level figures. Overall amounts stay in Rupees.
- Each audit para is one numbered finding. Amounts for a para must be converted \
to Lakhs: divide the Rupee amount by 100000 (Rs. 2,50,000 becomes 2.5).
- Numbers are plain JSON numbers with no currency symbols or thousands separators.
- If a field is absent from the report, use null. Do not guess.
- If the report has no audit paras, return an empty audit_paras array.
- Record anything missing or ambiguous in parsing_errors.

Respond ONLY with the JSON object. No markdown fences, no explanation, just raw JSON.";

/// Appended on retries to steer the model back to the required shape.
const RETRY_REMINDER: &str = "\
Your previous answer could not be used. Return only one valid JSON object \
with both the \"header\" and \"audit_paras\" keys.";

pub fn build_user_prompt(report_text: &str, attempt: u32) -> String {
    let mut prompt = format!(
        "Draft Audit Report text:\n\
         \n\
         {report_text}"
    );
    if attempt > 1 {
        prompt.push_str("\n\n");
        prompt.push_str(RETRY_REMINDER);
    }
    prompt
}

pub fn extraction_request(report_text: &str, attempt: u32) -> GenerateRequest {
    GenerateRequest {
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        user_prompt: build_user_prompt(report_text, attempt),
        max_tokens: MAX_OUTPUT_TOKENS,
        temperature: 0.0,
    }
}
