//! Prompt builders for every LLM call the backend makes
//!
//! The planner and analyzer prompts demand bare JSON; parsing and the
//! single repair retry live in the `LanguageModel` trait, not here.

/// Stage-1 planning prompt: choose 1-3 products from the catalog.
pub fn planner(question: &str, catalog_description: &str, sample_preview: &str) -> String {
    format!(
        "You are a data analyst planning how to answer a user's question about CRM service requests.\n\
         \n\
         USER QUESTION:\n{question}\n\
         \n\
         AVAILABLE DATA PRODUCTS:\n{catalog_description}\n\
         \n\
         SAMPLE DATA (frequency_over_time preview):\n{sample_preview}\n\
         \n\
         Your task is to determine which data products would be most helpful to answer the user's question.\n\
         \n\
         IMPORTANT: Return ONLY a valid JSON array with no additional text, markdown formatting, or code blocks.\n\
         \n\
         Output format (JSON array only):\n\
         [\n\
           {{\"product\": \"product_id_from_catalog\", \"why\": \"Brief reason why this data is needed\"}}\n\
         ]\n\
         \n\
         Select 1-3 most relevant data products. Be strategic - choose products that directly answer the question.\n\
         Keep each \"why\" to one short phrase (under 10 words).\n\
         Return only the JSON array, nothing else."
    )
}

/// Stage-2 analysis prompt: answer from the retrieved summaries only.
pub fn analyzer(question: &str, access_log_json: &str, data_section: &str) -> String {
    format!(
        "You are a data analyst providing insights on CRM service request data.\n\
         \n\
         USER QUESTION:\n{question}\n\
         \n\
         DATA PRODUCTS ACCESSED:\n{access_log_json}\n\
         \n\
         RETRIEVED DATA:\n{data_section}\n\
         \n\
         Based only on the data provided above, answer the user's question as briefly as possible.\n\
         Do not invent products or numbers that are not present in the retrieved data.\n\
         \n\
         Format your response as a JSON object with these keys:\n\
         - \"answer\": One concise sentence.\n\
         - \"rationale\": 3-7 brief bullet points citing key numbers from the data.\n\
         - \"key_metrics\": Short list of the numbers referenced (e.g. [\"663\", \"18.5%\"]).\n\
         \n\
         IMPORTANT: Keep every part minimal. Return ONLY valid JSON with no additional text, markdown, or code blocks."
    )
}

/// Keyword extraction for cluster embedding search.
pub fn search_keywords(question: &str) -> String {
    format!(
        "You are helping prepare a search query for matching a user message against municipal \
         service request cluster labels (e.g. \"Facility Booking\", \"Parks\", \"Roads\").\n\
         \n\
         User message: {question}\n\
         \n\
         Output a single short search phrase (5-15 words) that captures the key concepts for \
         semantic search. Use terms that would match cluster labels: facility, booking, room, \
         parks, roads, complaints, reservations, etc. No quotes or explanation - only the search phrase."
    )
}

/// Simple-chat persona: a brief assistant to the Mayor.
pub fn simple_chat(question: &str) -> String {
    format!(
        "You are an intelligent assistant to the Mayor, specializing in municipal service \
         requests and CRM data.\n\
         \n\
         You have knowledge about municipal service request categories (roads, traffic, \
         sidewalks, recreation, parks, etc.), the service request lifecycle, and how cities \
         handle citizen requests and complaints.\n\
         \n\
         Reply in 1-3 short sentences only. Be as brief as possible while still helpful.\n\
         If the user asks about specific data or analytics, say they can use \"analysis\" for \
         deep data analysis.\n\
         \n\
         USER QUESTION:\n{question}\n\
         \n\
         Your response:"
    )
}

/// Pick the single dashboard product that best fits a cluster.
pub fn pick_product_for_cluster(
    parent_label: &str,
    child_label: &str,
    catalog_description: &str,
    sample_preview: &str,
) -> String {
    format!(
        "You are a data analyst. The user is viewing a cluster: \"{parent_label}\" \
         (sub-cluster: \"{child_label}\").\n\
         \n\
         Choose the SINGLE most relevant data product to show on an analytics dashboard for \
         this cluster.\n\
         \n\
         AVAILABLE DATA PRODUCTS (only these have dashboard pages):\n{catalog_description}\n\
         \n\
         SAMPLE DATA (frequency_over_time preview):\n{sample_preview}\n\
         \n\
         IMPORTANT: Return ONLY a valid JSON array with exactly ONE object. No other text.\n\
         Output format: [{{\"product\": \"product_id_from_catalog\", \"why\": \"Brief reason\"}}]\n\
         Return only the JSON array."
    )
}

/// Short discussion tying an analytics view to a cluster.
pub fn discuss_visit(
    parent_label: &str,
    child_label: &str,
    product_name: &str,
    data_summary: &str,
) -> String {
    let trimmed: String = data_summary.chars().take(2000).collect();
    format!(
        "You are an assistant to the Mayor. The user just opened the \"{product_name}\" \
         analytics view after viewing the cluster \"{parent_label}\" (sub-cluster \
         \"{child_label}\").\n\
         \n\
         Data summary for this view (brief):\n{trimmed}\n\
         \n\
         Write 1-3 short sentences that either explain how this analytics view relates to that \
         cluster (if there is a clear link), or discuss general trends from the data (if the \
         link is weak).\n\
         Be concise and natural. No bullet points. Output only the paragraph."
    )
}

/// Turn a discussion paragraph into structured report fields.
pub fn report_fields(parent_label: &str, child_label: &str, discussion: &str) -> String {
    format!(
        "You are preparing structured data for a CRM analytics PDF report.\n\
         \n\
         Cluster context: \"{parent_label}\" (sub-cluster: \"{child_label}\").\n\
         Discussion text shown to the user: {discussion}\n\
         \n\
         Output a JSON object with exactly these keys:\n\
         - \"answer\": One or two sentences summarizing the main finding.\n\
         - \"rationale\": Array of 2-5 short bullet strings with specific insights and numbers.\n\
         - \"key_metrics\": Array of metric strings, each containing both a number and a \
         category name (e.g. \"663 recent requests in Recreation and leisure\", \
         \"18.5% in Recreation and leisure\"). Include 5-12 entries covering the main \
         categories and numbers from the discussion.\n\
         \n\
         Return ONLY valid JSON, no markdown or code fences."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_prompt_embeds_inputs() {
        let prompt = planner("top categories?", "## Available Data Products", "Shape: 10 rows");
        assert!(prompt.contains("top categories?"));
        assert!(prompt.contains("## Available Data Products"));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn test_discuss_visit_truncates_long_summaries() {
        let long = "x".repeat(5000);
        let prompt = discuss_visit("Parks", "Playgrounds", "Frequency", &long);
        assert!(prompt.len() < 3000);
    }

    #[test]
    fn test_simple_chat_carries_persona() {
        let prompt = simple_chat("hello");
        assert!(prompt.contains("assistant to the Mayor"));
        assert!(prompt.contains("hello"));
    }
}
