use anyhow::{anyhow, Context, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::model::{
    generate_id, AiInstance, AiInstanceUpdate, Checkpoint, CheckpointFilter, CheckpointScope,
    CheckpointUpdate, Id, InstanceListFilter, NewAiInstance, NewCheckpoint, NewPrediction,
    NewTemplate, PrelabelOutput, Prediction, TagPredicate, Template, TemplateListFilter,
    TemplateUpdate, Visibility,
};
use crate::store::traits::{
    AiInstanceStore, CheckpointStore, PredictionStore, Store, TemplateStore,
};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run schema setup. The partial unique indexes on `(scope, tag)` make
    /// the one-holder-per-tag invariant a store constraint; the resolver's
    /// multi-row check then only catches rows written before the index
    /// existed or through a schema that lacks it.
    pub async fn migrate(&self) -> Result<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                version INTEGER NOT NULL,
                trainable BOOLEAN NOT NULL,
                visibility TEXT NOT NULL,
                default_checkpoint TEXT,
                input_schema JSONB,
                output_schema JSONB,
                description TEXT,
                image TEXT,
                model_artifact TEXT,
                owner_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (name, version, owner_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ai_instances (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL REFERENCES templates(id),
                name TEXT NOT NULL,
                visibility TEXT NOT NULL,
                checkpoint_tag TEXT,
                deployment_parameters JSONB,
                owner_id TEXT NOT NULL,
                editor_id TEXT,
                organisation_id TEXT,
                served_by TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL REFERENCES templates(id),
                ai_instance_id TEXT REFERENCES ai_instances(id),
                tag TEXT,
                version INTEGER NOT NULL,
                parent_version INTEGER,
                weights_path TEXT NOT NULL,
                metadata JSONB,
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS checkpoints_template_tag_key
                ON checkpoints (template_id, tag)
                WHERE ai_instance_id IS NULL AND tag IS NOT NULL
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS checkpoints_instance_tag_key
                ON checkpoints (ai_instance_id, tag)
                WHERE ai_instance_id IS NOT NULL AND tag IS NOT NULL
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id TEXT PRIMARY KEY,
                app_id TEXT NOT NULL,
                job_id TEXT NOT NULL,
                checkpoint_id TEXT NOT NULL,
                assignment_type TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS prediction_outputs (
                prediction_id TEXT NOT NULL REFERENCES predictions(id),
                sequence_index INTEGER NOT NULL,
                output JSONB,
                score DOUBLE PRECISION,
                PRIMARY KEY (prediction_id, sequence_index)
            )
            "#,
        ];

        for statement in ddl {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to run schema setup")?;
        }

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn visibility_from_row(row: &PgRow, column: &str) -> Visibility {
    let raw: String = row.get(column);
    // Default fallback for rows predating the enum
    Visibility::parse(&raw).unwrap_or(Visibility::Private)
}

fn template_from_row(row: &PgRow) -> Template {
    Template {
        id: row.get("id"),
        name: row.get("name"),
        version: row.get("version"),
        trainable: row.get("trainable"),
        visibility: visibility_from_row(row, "visibility"),
        default_checkpoint: row.get("default_checkpoint"),
        input_schema: row.get("input_schema"),
        output_schema: row.get("output_schema"),
        description: row.get("description"),
        image: row.get("image"),
        model_artifact: row.get("model_artifact"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn instance_from_row(row: &PgRow) -> AiInstance {
    AiInstance {
        id: row.get("id"),
        template_id: row.get("template_id"),
        name: row.get("name"),
        visibility: visibility_from_row(row, "visibility"),
        checkpoint_tag: row.get("checkpoint_tag"),
        deployment_parameters: row.get("deployment_parameters"),
        owner_id: row.get("owner_id"),
        editor_id: row.get("editor_id"),
        organisation_id: row.get("organisation_id"),
        served_by: row.get("served_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn checkpoint_from_row(row: &PgRow) -> Checkpoint {
    Checkpoint {
        id: row.get("id"),
        template_id: row.get("template_id"),
        ai_instance_id: row.get("ai_instance_id"),
        tag: row.get("tag"),
        version: row.get("version"),
        parent_version: row.get("parent_version"),
        weights_path: row.get("weights_path"),
        metadata: row.get("metadata"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn prediction_from_row(row: &PgRow) -> Prediction {
    Prediction {
        id: row.get("id"),
        app_id: row.get("app_id"),
        job_id: row.get("job_id"),
        checkpoint_id: row.get("checkpoint_id"),
        assignment_type: row.get("assignment_type"),
        created_at: row.get("created_at"),
    }
}

fn output_from_row(row: &PgRow) -> PrelabelOutput {
    PrelabelOutput {
        prediction_id: row.get("prediction_id"),
        sequence_index: row.get("sequence_index"),
        output: row.get("output"),
        score: row.get("score"),
    }
}

fn like_pattern(needle: &str) -> String {
    format!("%{}%", needle)
}

#[async_trait::async_trait]
impl TemplateStore for PostgresStore {
    async fn get_template(&self, id: &Id) -> Result<Option<Template>> {
        let row = sqlx::query("SELECT * FROM templates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch template")?;

        Ok(row.as_ref().map(template_from_row))
    }

    async fn list_templates(&self, filter: &TemplateListFilter) -> Result<Vec<Template>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM templates WHERE TRUE");
        if let Some(name) = &filter.name {
            query.push(" AND name ILIKE ").push_bind(like_pattern(name));
        }
        if let Some(version) = filter.version {
            query.push(" AND version = ").push_bind(version);
        }
        if let Some(visibility) = filter.visibility {
            query.push(" AND visibility = ").push_bind(visibility.as_str());
        }
        if let Some(trainable) = filter.trainable {
            query.push(" AND trainable = ").push_bind(trainable);
        }
        query.push(" ORDER BY created_at");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list templates")?;

        Ok(rows.iter().map(template_from_row).collect())
    }

    async fn insert_template(&self, new: NewTemplate) -> Result<Id> {
        let template = new.into_template(generate_id());
        sqlx::query(
            r#"
            INSERT INTO templates (id, name, version, trainable, visibility, input_schema,
                                   output_schema, description, image, model_artifact, owner_id,
                                   created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(template.version)
        .bind(template.trainable)
        .bind(template.visibility.as_str())
        .bind(&template.input_schema)
        .bind(&template.output_schema)
        .bind(&template.description)
        .bind(&template.image)
        .bind(&template.model_artifact)
        .bind(&template.owner_id)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert template")?;

        Ok(template.id)
    }

    async fn update_template(&self, id: &Id, update: TemplateUpdate) -> Result<Option<Id>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE templates SET updated_at = NOW()");
        if let Some(name) = &update.name {
            query.push(", name = ").push_bind(name.clone());
        }
        if let Some(trainable) = update.trainable {
            query.push(", trainable = ").push_bind(trainable);
        }
        if let Some(visibility) = update.visibility {
            query.push(", visibility = ").push_bind(visibility.as_str());
        }
        if let Some(input_schema) = &update.input_schema {
            query.push(", input_schema = ").push_bind(input_schema.clone());
        }
        if let Some(output_schema) = &update.output_schema {
            query.push(", output_schema = ").push_bind(output_schema.clone());
        }
        if let Some(description) = &update.description {
            query.push(", description = ").push_bind(description.clone());
        }
        if let Some(image) = &update.image {
            query.push(", image = ").push_bind(image.clone());
        }
        if let Some(model_artifact) = &update.model_artifact {
            query.push(", model_artifact = ").push_bind(model_artifact.clone());
        }
        query.push(" WHERE id = ").push_bind(id.clone());
        query.push(" RETURNING id");

        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update template")?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn delete_template(&self, id: &Id) -> Result<Option<Id>> {
        let row = sqlx::query("DELETE FROM templates WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to delete template")?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn set_default_checkpoint(
        &self,
        template_id: &Id,
        checkpoint_id: Option<Id>,
    ) -> Result<Option<Id>> {
        let row = sqlx::query(
            "UPDATE templates SET default_checkpoint = $2, updated_at = NOW() WHERE id = $1 RETURNING id",
        )
        .bind(template_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to set default checkpoint")?;

        Ok(row.map(|r| r.get("id")))
    }
}

#[async_trait::async_trait]
impl AiInstanceStore for PostgresStore {
    async fn get_instance(&self, id: &Id) -> Result<Option<AiInstance>> {
        let row = sqlx::query("SELECT * FROM ai_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch instance")?;

        Ok(row.as_ref().map(instance_from_row))
    }

    async fn list_instances(&self, filter: &InstanceListFilter) -> Result<Vec<AiInstance>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT i.* FROM ai_instances i JOIN templates t ON t.id = i.template_id WHERE TRUE",
        );
        if let Some(name) = &filter.name {
            query.push(" AND i.name ILIKE ").push_bind(like_pattern(name));
        }
        if let Some(ai_name) = &filter.ai_name {
            query.push(" AND t.name ILIKE ").push_bind(like_pattern(ai_name));
        }
        if let Some(ai_version) = &filter.ai_version {
            query
                .push(" AND t.version::text ILIKE ")
                .push_bind(like_pattern(ai_version));
        }
        if let Some(visibility) = filter.visibility {
            query.push(" AND i.visibility = ").push_bind(visibility.as_str());
        }
        if let Some(checkpoint_tag) = &filter.checkpoint_tag {
            query
                .push(" AND i.checkpoint_tag = ")
                .push_bind(checkpoint_tag.clone());
        }
        query.push(" ORDER BY i.created_at");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list instances")?;

        Ok(rows.iter().map(instance_from_row).collect())
    }

    async fn insert_instance(&self, new: NewAiInstance) -> Result<Id> {
        let instance = new.into_instance(generate_id());
        sqlx::query(
            r#"
            INSERT INTO ai_instances (id, template_id, name, visibility, checkpoint_tag,
                                      deployment_parameters, owner_id, editor_id,
                                      organisation_id, served_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.template_id)
        .bind(&instance.name)
        .bind(instance.visibility.as_str())
        .bind(&instance.checkpoint_tag)
        .bind(&instance.deployment_parameters)
        .bind(&instance.owner_id)
        .bind(&instance.editor_id)
        .bind(&instance.organisation_id)
        .bind(&instance.served_by)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert instance")?;

        Ok(instance.id)
    }

    async fn update_instance(&self, id: &Id, update: AiInstanceUpdate) -> Result<Option<Id>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE ai_instances SET updated_at = NOW()");
        if let Some(name) = &update.name {
            query.push(", name = ").push_bind(name.clone());
        }
        if let Some(visibility) = update.visibility {
            query.push(", visibility = ").push_bind(visibility.as_str());
        }
        if let Some(checkpoint_tag) = &update.checkpoint_tag {
            query.push(", checkpoint_tag = ").push_bind(checkpoint_tag.clone());
        }
        if let Some(deployment_parameters) = &update.deployment_parameters {
            query
                .push(", deployment_parameters = ")
                .push_bind(deployment_parameters.clone());
        }
        if let Some(editor_id) = &update.editor_id {
            query.push(", editor_id = ").push_bind(editor_id.clone());
        }
        if let Some(served_by) = &update.served_by {
            query.push(", served_by = ").push_bind(served_by.clone());
        }
        query.push(" WHERE id = ").push_bind(id.clone());
        query.push(" RETURNING id");

        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update instance")?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn delete_instance(&self, id: &Id) -> Result<Option<Id>> {
        let row = sqlx::query("DELETE FROM ai_instances WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to delete instance")?;

        Ok(row.map(|r| r.get("id")))
    }
}

#[async_trait::async_trait]
impl CheckpointStore for PostgresStore {
    async fn get_checkpoint(&self, id: &Id) -> Result<Option<Checkpoint>> {
        let row = sqlx::query("SELECT * FROM checkpoints WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch checkpoint")?;

        Ok(row.as_ref().map(checkpoint_from_row))
    }

    async fn find_checkpoints(&self, filter: &CheckpointFilter) -> Result<Vec<Checkpoint>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM checkpoints WHERE ");
        match &filter.scope {
            CheckpointScope::Template(template_id) => {
                query
                    .push("template_id = ")
                    .push_bind(template_id.clone())
                    .push(" AND ai_instance_id IS NULL");
            }
            CheckpointScope::Instance(instance_id) => {
                query.push("ai_instance_id = ").push_bind(instance_id.clone());
            }
        }
        match &filter.tag {
            TagPredicate::Eq(tag) => {
                query.push(" AND tag = ").push_bind(tag.clone());
            }
            TagPredicate::IsNull => {
                query.push(" AND tag IS NULL");
            }
            TagPredicate::NotNull => {
                query.push(" AND tag IS NOT NULL");
            }
            TagPredicate::Any => {}
        }
        query.push(" ORDER BY created_at");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to find checkpoints")?;

        Ok(rows.iter().map(checkpoint_from_row).collect())
    }

    async fn insert_checkpoint(&self, new: NewCheckpoint) -> Result<Id> {
        let checkpoint = new.into_checkpoint(generate_id());
        sqlx::query(
            r#"
            INSERT INTO checkpoints (id, template_id, ai_instance_id, tag, version,
                                     parent_version, weights_path, metadata, description,
                                     created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&checkpoint.id)
        .bind(&checkpoint.template_id)
        .bind(&checkpoint.ai_instance_id)
        .bind(&checkpoint.tag)
        .bind(checkpoint.version)
        .bind(checkpoint.parent_version)
        .bind(&checkpoint.weights_path)
        .bind(&checkpoint.metadata)
        .bind(&checkpoint.description)
        .bind(checkpoint.created_at)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert checkpoint")?;

        Ok(checkpoint.id)
    }

    async fn update_checkpoint(&self, id: &Id, update: CheckpointUpdate) -> Result<Option<Id>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE checkpoints SET updated_at = NOW()");
        if let Some(tag) = &update.tag {
            query.push(", tag = ").push_bind(tag.clone());
        }
        if let Some(description) = &update.description {
            query.push(", description = ").push_bind(description.clone());
        }
        if let Some(metadata) = &update.metadata {
            query.push(", metadata = ").push_bind(metadata.clone());
        }
        query.push(" WHERE id = ").push_bind(id.clone());
        query.push(" RETURNING id");

        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update checkpoint")?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn delete_checkpoint(&self, id: &Id) -> Result<Option<Id>> {
        let row = sqlx::query("DELETE FROM checkpoints WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to delete checkpoint")?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn transfer_tag(&self, scope: &CheckpointScope, tag: &str, to: &Id) -> Result<Id> {
        // Clear-then-set inside one transaction so no reader observes two
        // holders or a tagless gap, and the partial unique index never trips.
        let mut tx = self.pool.begin().await.context("Failed to begin transfer")?;

        let target = sqlx::query("SELECT template_id, ai_instance_id FROM checkpoints WHERE id = $1")
            .bind(to)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch transfer target")?
            .ok_or_else(|| anyhow!("checkpoint {} does not exist", to))?;

        let target_scope = match target.get::<Option<Id>, _>("ai_instance_id") {
            Some(instance_id) => CheckpointScope::Instance(instance_id),
            None => CheckpointScope::Template(target.get("template_id")),
        };
        if &target_scope != scope {
            return Err(anyhow!(
                "checkpoint {} is scoped to {}, not {}",
                to,
                target_scope,
                scope
            ));
        }

        match scope {
            CheckpointScope::Template(template_id) => {
                sqlx::query(
                    "UPDATE checkpoints SET tag = NULL, updated_at = NOW() \
                     WHERE template_id = $1 AND ai_instance_id IS NULL AND tag = $2",
                )
                .bind(template_id)
                .bind(tag)
                .execute(&mut *tx)
                .await
                .context("Failed to clear previous tag holder")?;
            }
            CheckpointScope::Instance(instance_id) => {
                sqlx::query(
                    "UPDATE checkpoints SET tag = NULL, updated_at = NOW() \
                     WHERE ai_instance_id = $1 AND tag = $2",
                )
                .bind(instance_id)
                .bind(tag)
                .execute(&mut *tx)
                .await
                .context("Failed to clear previous tag holder")?;
            }
        }

        sqlx::query("UPDATE checkpoints SET tag = $2, updated_at = NOW() WHERE id = $1")
            .bind(to)
            .bind(tag)
            .execute(&mut *tx)
            .await
            .context("Failed to set new tag holder")?;

        tx.commit().await.context("Failed to commit transfer")?;
        Ok(to.clone())
    }
}

#[async_trait::async_trait]
impl PredictionStore for PostgresStore {
    async fn get_prediction(&self, id: &Id) -> Result<Option<Prediction>> {
        let row = sqlx::query("SELECT * FROM predictions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch prediction")?;

        Ok(row.as_ref().map(prediction_from_row))
    }

    async fn insert_prediction(&self, new: NewPrediction) -> Result<Id> {
        let prediction = new.into_prediction(generate_id());
        sqlx::query(
            r#"
            INSERT INTO predictions (id, app_id, job_id, checkpoint_id, assignment_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&prediction.id)
        .bind(&prediction.app_id)
        .bind(&prediction.job_id)
        .bind(&prediction.checkpoint_id)
        .bind(&prediction.assignment_type)
        .bind(prediction.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert prediction")?;

        Ok(prediction.id)
    }

    async fn insert_output(&self, output: PrelabelOutput) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prediction_outputs (prediction_id, sequence_index, output, score)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&output.prediction_id)
        .bind(output.sequence_index)
        .bind(&output.output)
        .bind(output.score)
        .execute(&self.pool)
        .await
        .context("Failed to insert prediction output")?;

        Ok(())
    }

    async fn list_outputs(&self, prediction_id: &Id) -> Result<Vec<PrelabelOutput>> {
        let rows = sqlx::query(
            "SELECT * FROM prediction_outputs WHERE prediction_id = $1 ORDER BY sequence_index",
        )
        .bind(prediction_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list prediction outputs")?;

        Ok(rows.iter().map(output_from_row).collect())
    }
}

impl Store for PostgresStore {}
