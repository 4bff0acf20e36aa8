//! Prompt templates and engineering

use crate::error::{Error, Result};
use handlebars::Handlebars;
use serde::Serialize;

/// A prompt template using Handlebars syntax
pub struct PromptTemplate {
    /// Template name
    name: String,
    /// Handlebars registry
    registry: Handlebars<'static>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        let name = name.into();
        let mut registry = Handlebars::new();
        // Prompts are plain text, not HTML
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(&name, template)
            .map_err(|e| Error::Internal(format!("Invalid template: {}", e)))?;

        Ok(PromptTemplate { name, registry })
    }

    /// Render the template with given data
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        self.registry
            .render(&self.name, data)
            .map_err(|e| Error::Internal(format!("Template render error: {}", e)))
    }
}

/// Domain system prompt for the gene program assistant.
///
/// `dataset_info` describes the files the user has uploaded.
pub const CHAT_SYSTEM_TEMPLATE: &str = r#"You are a computational biology assistant for single-cell genomics and gene program analysis.

{{#if dataset_info}}The user has uploaded the following data:

{{dataset_info}}

{{/if}}## Dataset IDs
Users name files (for example "eoe_program_activity.h5ad"); tools take dataset IDs (for example "ds_1767761666236_y4v1qm1bx").
- Resolve every filename with get_dataset_id_by_name(filename) before calling any other tool.
- Look for @filename mentions in the latest message and in earlier turns.
- H5AD files hold program ACTIVITY per cell (columns such as new_program_5_activity_scaled).
- JSON files hold program GENE LOADINGS (program "5" corresponds to new_program_5_activity_scaled).

## Which file each tool needs
- jaccard_topk, gene_to_programs, program_top_genes: the JSON loadings file only.
- program_celltype_enrichment, program_pairwise_enrichment, correlation_matrix: the H5AD file only.
Ask for a file only when the needed one has not been named. A single @programs_with_loadings.json is enough for gene overlap questions.

## Choosing an analysis
- Gene overlap or similarity between programs: jaccard_topk.
- Which programs contain a gene: gene_to_programs.
- Genes in a program: program_top_genes.
- Cell-type enrichment (one cell type vs all others): program_celltype_enrichment(h5ad_id, cell_type_col).
- Disease enrichment (e.g. Active vs Ctrl, pairwise): program_pairwise_enrichment(h5ad_id, group_col, group_a, group_b).
- Program correlation: correlation_matrix.
Never describe disease_status groups as cell types.

## Column names
Call get_h5ad_schema(dataset_id) before any enrichment or plot and use the exact column names and group values it returns (e.g. "disease_status", "Active", "Ctrl").

## Plots
- One boxplot: call boxplot(h5ad_id, program_name, group_by, title). It returns {"type": "plotly", "spec": {...}}; reply with that JSON inside a ```plotly code fence.
- Several boxplots: up to 5 programs use boxplot_batch(h5ad_id, program_names, group_by, title_prefix), which returns {"type": "plotly_batch", "plots": [...]}, also inside a ```plotly fence. For more than 5, explain the limit and ask which to show.

## Result tables
- program_celltype_enrichment: a Markdown table | Program # | Name | Description | Enriched cell types |, where Program # is results[i].program_number and the last column joins results[i].enriched_in[j].group_value_label (keep any ★).
- program_pairwise_enrichment: a Markdown table | Program # | Name | Description | Higher in |, where Higher in is results[i].higher_group_label (keep any ★).
Do not show U statistics, p-values or q-values.

Keep answers concise and always use the tools before answering questions about the data."#;

/// System instruction for conversation titles
pub const TITLE_SYSTEM_PROMPT: &str = "You write short titles for chat conversations. \
Reply with a title of at most three words that captures the topic of the user's message. \
No quotes, no punctuation, no explanation.";

#[derive(Serialize)]
struct ChatPromptData<'a> {
    dataset_info: Option<&'a str>,
}

/// Build the domain system prompt, including the dataset block when
/// `domain_context` is non-blank.
pub fn build_chat_system_prompt(domain_context: Option<&str>) -> Result<String> {
    let template = PromptTemplate::new("chat_system", CHAT_SYSTEM_TEMPLATE)?;
    let dataset_info = domain_context.map(str::trim).filter(|s| !s.is_empty());
    template.render(&ChatPromptData { dataset_info })
}
