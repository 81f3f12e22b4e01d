use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use domainql::config::{self, CompilerConfig, DialectKind};
use domainql::pipeline_generator::AggregationPlanBuilder;
use domainql::query_object::{QueryNode, Scalar};
use domainql::schema_catalog::{SchemaConfig, SchemaRegistry};
use domainql::sql_generator::{SqlPlan, SqlPlanBuilder};
use std::io::Read;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Sql,
    Pipeline,
}

/// DomainQL - compile query objects into SQL or aggregation pipelines
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML schema declaring entities, views and relations
    #[arg(long)]
    schema: std::path::PathBuf,

    /// Entity or view to query
    #[arg(long)]
    entity: String,

    /// Query object as JSON; read from stdin when omitted
    #[arg(long)]
    query: Option<String>,

    #[arg(long, value_enum, default_value_t = Backend::Sql)]
    backend: Backend,

    /// Emit the count plan instead of the page query
    #[arg(long)]
    count: bool,

    /// Relation field to batch-load for `--parent-ids` (SQL backend)
    #[arg(long, requires = "parent_ids")]
    sub_domain: Option<String>,

    /// Comma separated parent ids
    #[arg(long, value_delimiter = ',')]
    parent_ids: Vec<String>,

    /// Table name template, e.g. `t_%s`
    #[arg(long)]
    table_format: Option<String>,

    /// Join table name template, e.g. `j_%s_and_%s`
    #[arg(long)]
    join_table_format: Option<String>,

    /// Paging dialect: limit_offset or fetch_first
    #[arg(long)]
    dialect: Option<DialectKind>,

    /// Map camelCase fields to snake_case columns
    #[arg(long)]
    map_camel_case_to_underscore: bool,
}

impl From<&Cli> for config::CliConfig {
    fn from(cli: &Cli) -> Self {
        config::CliConfig {
            table_format: cli.table_format.clone(),
            join_table_format: cli.join_table_format.clone(),
            dialect: cli.dialect,
            map_camel_case_to_underscore: cli.map_camel_case_to_underscore,
        }
    }
}

fn parse_id(raw: &str) -> Scalar {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| Scalar::from_json(&v))
        .unwrap_or_else(|| Scalar::Text(raw.to_string()))
}

fn print_plan(plan: &SqlPlan) -> anyhow::Result<()> {
    println!("{}", plan.sql);
    println!("{}", serde_json::to_string(&plan.args)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Defaults to INFO, overridable with RUST_LOG
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = CompilerConfig::from_cli(config::CliConfig::from(&cli))
        .context("invalid compiler configuration")?;

    let schema = SchemaConfig::from_yaml_file(&cli.schema)
        .with_context(|| format!("failed to load schema {}", cli.schema.display()))?;
    let registry = SchemaRegistry::new(schema, &config)?;
    if !registry.contains(&cli.entity) {
        bail!(
            "unknown entity '{}' (declared: {})",
            cli.entity,
            registry.entity_names().join(", ")
        );
    }

    let text = match &cli.query {
        Some(text) => text.clone(),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    let query = if text.trim().is_empty() {
        QueryNode::new()
    } else {
        QueryNode::from_json_str(&text, &config)?
    };
    log::debug!("Parsed query for '{}': {:?}", cli.entity, query);

    match cli.backend {
        Backend::Sql => {
            let builder = SqlPlanBuilder::new(&registry, &config);
            if let Some(relation) = &cli.sub_domain {
                let ids: Vec<Scalar> = cli.parent_ids.iter().map(|id| parse_id(id)).collect();
                match builder.build_sub_domain_batch(&cli.entity, relation, &ids, Some(&query))? {
                    Some(plan) => print_plan(&plan)?,
                    None => log::info!("No parent ids, nothing to load"),
                }
            } else if cli.count {
                print_plan(&builder.build_count(&query, &cli.entity)?)?;
            } else {
                print_plan(&builder.build_select(&query, &cli.entity)?)?;
            }
        }
        Backend::Pipeline => {
            if cli.sub_domain.is_some() {
                bail!("--sub-domain is only available for the sql backend");
            }
            let builder = AggregationPlanBuilder::new(&registry, &config);
            let pipeline = if cli.count {
                builder.build_count(&query, &cli.entity)?
            } else {
                builder.build_query(&query, &cli.entity)?
            };
            println!("{}", pipeline);
        }
    }
    Ok(())
}
