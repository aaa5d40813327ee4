use crate::tools::ToolDefinition;

/// System prompt for the tool-selecting agent
pub fn build_system_prompt(schema: &str, tools: &[ToolDefinition], few_shot_examples: &str) -> String {
    let tool_list = tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "You are an analytics assistant for a retail promotions dataset. You answer questions \
about promotion performance (sales, uplift, ROI, RAG status) by calling tools.\n\n\
DATASET:\n{}\n\
TOOLS:\n{}\n\n\
CHOOSING A TOOL:\n\
- sql_query for exact numbers: totals, averages, counts, rankings, filters on known values.\n\
- semantic_search for finding similar or loosely described promotions.\n\
- ml_prediction for forecasts, what-if scenarios and expected outcomes.\n\
- Pass the user's question to the tool unchanged.\n\
- Answer from tool output only; if a tool reports an error, say what went wrong.\n\n\
FORMATTING:\n\
- Do not answer with tables. Give figures as `name: value` lines.\n\
- Group related values under a bullet when one point has several figures.\n\
- ROI%_PromoID is the actual ROI; prefer it over ROI% when discussing ROI.\n",
        schema, tool_list
    );

    let few_shot_examples = few_shot_examples.trim();
    if !few_shot_examples.is_empty() {
        prompt.push_str("\nEXAMPLES:\n");
        prompt.push_str(few_shot_examples);
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolKind;

    #[test]
    fn test_prompt_lists_tools_and_examples() {
        let tools = vec![ToolDefinition::question_tool(ToolKind::SqlQuery, "Aggregations.")];
        let prompt = build_system_prompt("Table \"promotions\"", &tools, "Q: total sales?\nTool: sql_query");
        assert!(prompt.contains("- sql_query: Aggregations."));
        assert!(prompt.contains("Table \"promotions\""));
        assert!(prompt.contains("EXAMPLES:\nQ: total sales?"));

        let bare = build_system_prompt("schema", &tools, "   ");
        assert!(!bare.contains("EXAMPLES:"));
    }
}
