//! End-to-end query pipeline.
//!
//! One `process` call resolves the target database, loads its schema,
//! generates SQL with validation-driven retries, and either returns
//! the SQL or executes it and scores the results. Failures come back
//! as coded error responses, never as panics or opaque strings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use delfi_core::{
    DatabaseSchema, GatewayConfig, GatewayError, QueryRequest, QueryResponse, QueryResult,
    ReturnType, ValidationResult,
};
use delfi_guard::SqlValidator;
use delfi_resilience::{CircuitBreaker, RateLimiter, RatePermit};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::llm::{DatabaseSelector, ResultValidator, SqlGenerator};
use crate::metrics::{MetricsCollector, NoopMetrics};
use crate::schema_cache::SchemaCache;

/// Coordinates the natural-language-to-SQL pipeline across the
/// catalog, the LLM seams, validation and the resilience layer.
pub struct Orchestrator {
    config: Arc<GatewayConfig>,
    catalog: Catalog,
    generator: Arc<dyn SqlGenerator>,
    validator: SqlValidator,
    schema_cache: SchemaCache,
    breaker: CircuitBreaker,
    limiter: Option<Arc<RateLimiter>>,
    selector: Option<Arc<dyn DatabaseSelector>>,
    result_validator: Option<Arc<dyn ResultValidator>>,
    metrics: Arc<dyn MetricsCollector>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<GatewayConfig>,
        catalog: Catalog,
        generator: Arc<dyn SqlGenerator>,
    ) -> Self {
        let resilience = &config.resilience;
        let breaker = CircuitBreaker::new(
            resilience.circuit_breaker_threshold,
            Duration::from_secs(resilience.circuit_breaker_timeout_seconds),
        );
        let limiter = resilience.rate_limit_enabled.then(|| {
            Arc::new(RateLimiter::new(
                resilience.max_concurrent_queries,
                resilience.max_concurrent_llm,
            ))
        });
        Self {
            validator: SqlValidator::new(&config.security),
            schema_cache: SchemaCache::new(&config.cache),
            breaker,
            limiter,
            selector: None,
            result_validator: None,
            metrics: Arc::new(NoopMetrics),
            config,
            catalog,
            generator,
        }
    }

    /// Attach a selector for multi-database routing.
    pub fn with_selector(mut self, selector: Arc<dyn DatabaseSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Attach an LLM judge that scores executed results.
    pub fn with_result_validator(mut self, validator: Arc<dyn ResultValidator>) -> Self {
        self.result_validator = Some(validator);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    /// Load schemas for every cataloged database, warming the cache.
    ///
    /// Failures are logged and skipped; returns how many databases
    /// loaded cleanly.
    pub async fn preload_schemas(&self) -> usize {
        let mut loaded = 0;
        for name in self.catalog.names() {
            match self.get_schema(&name).await {
                Ok(schema) => {
                    debug!(database = %name, tables = schema.tables.len(), "schema preloaded");
                    loaded += 1;
                }
                Err(err) => {
                    warn!(database = %name, error = %err, "schema preload failed");
                }
            }
        }
        loaded
    }

    /// Run one request through the full pipeline.
    pub async fn process(&self, request: QueryRequest) -> QueryResponse {
        let request_id = Uuid::new_v4();
        info!(
            %request_id,
            question_chars = request.question.chars().count(),
            database = request.database.as_deref().unwrap_or("auto"),
            return_type = ?request.return_type,
            "processing query request"
        );

        // Resolve the target before taking a concurrency slot so a
        // misaddressed request never occupies one.
        let database = match self.resolve_database(&request).await {
            Ok(name) => name,
            Err(err) => {
                let label = request.database.as_deref().unwrap_or("unknown");
                self.metrics.increment_query_request("error", label);
                warn!(%request_id, error = %err, "database resolution failed");
                return QueryResponse::failure(&err);
            }
        };

        let _slot = match self.acquire_query_slot().await {
            Ok(slot) => slot,
            Err(err) => {
                self.metrics.increment_query_request("rate_limited", &database);
                warn!(%request_id, database = %database, "query concurrency limit hit");
                return QueryResponse::failure(&err);
            }
        };

        let started = Instant::now();
        let outcome = self.answer(request_id, &request, &database).await;
        self.metrics
            .observe_query_duration(started.elapsed().as_secs_f64());

        match outcome {
            Ok(response) => response,
            Err(err) => {
                self.metrics.increment_query_request("error", &database);
                warn!(
                    %request_id,
                    database = %database,
                    code = err.kind.code(),
                    error = %err,
                    "query request failed"
                );
                QueryResponse::failure(&err)
            }
        }
    }

    /// Pipeline stages after database resolution and admission.
    async fn answer(
        &self,
        request_id: Uuid,
        request: &QueryRequest,
        database: &str,
    ) -> Result<QueryResponse, GatewayError> {
        let schema = self.get_schema(database).await?;
        let (sql, validation, tokens_used) = self
            .generate_with_retry(request_id, &request.question, &schema)
            .await?;

        if request.return_type == ReturnType::Sql {
            self.metrics.increment_query_request("success", database);
            info!(%request_id, database, "returning generated SQL without execution");
            return Ok(QueryResponse::sql_only(sql, validation, tokens_used));
        }

        let executor = self
            .catalog
            .get(database)
            .and_then(|entry| entry.executor.clone())
            .ok_or_else(|| {
                GatewayError::database(format!(
                    "No SQL executor configured for database '{database}'"
                ))
                .with_details(json!({
                    "requested_database": database,
                    "available_databases": self.catalog.names(),
                }))
            })?;

        let db_started = Instant::now();
        let executed = executor.execute(&sql).await?;
        let elapsed = db_started.elapsed();
        self.metrics.observe_db_query_duration(elapsed.as_secs_f64());

        if executed.total_rows > executed.rows.len() {
            info!(
                %request_id,
                database,
                total_rows = executed.total_rows,
                returned = executed.rows.len(),
                "result set truncated to row limit"
            );
        }

        let result = QueryResult {
            columns: executed.columns,
            row_count: executed.rows.len(),
            rows: executed.rows,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
        };

        let confidence = self
            .score_results(request_id, &request.question, &sql, &result)
            .await;

        self.metrics.increment_query_request("success", database);
        info!(
            %request_id,
            database,
            rows = result.row_count,
            confidence,
            "query request completed"
        );
        Ok(QueryResponse::success(
            sql, validation, result, confidence, tokens_used,
        ))
    }

    /// Decide which database a request targets.
    async fn resolve_database(&self, request: &QueryRequest) -> Result<String, GatewayError> {
        if let Some(name) = &request.database {
            if self.catalog.contains(name) {
                return Ok(name.clone());
            }
            return Err(
                GatewayError::database(format!("Database '{name}' not found")).with_details(
                    json!({
                        "requested_database": name,
                        "available_databases": self.catalog.names(),
                    }),
                ),
            );
        }

        if self.catalog.is_empty() {
            return Err(GatewayError::database("No databases configured"));
        }
        if let Some(only) = self.single_database() {
            return Ok(only);
        }

        if self.config.auto_select {
            if let Some(selector) = &self.selector {
                let descriptions = self.catalog.descriptions();
                match selector.select(&request.question, &descriptions).await {
                    Ok(selection) if self.catalog.contains(&selection.database) => {
                        info!(
                            database = %selection.database,
                            confidence = selection.confidence,
                            reason = %selection.reason,
                            "smart database selection"
                        );
                        return Ok(selection.database);
                    }
                    Ok(selection) => {
                        warn!(
                            database = %selection.database,
                            "selector picked an unknown database, falling back"
                        );
                    }
                    Err(err) => {
                        warn!(error = %err, "database selection failed, falling back");
                    }
                }
            }
        }

        if let Some(default) = &self.config.default_database {
            if self.catalog.contains(default) {
                return Ok(default.clone());
            }
        }

        Err(
            GatewayError::database("Multiple databases available, please specify which to query")
                .with_details(json!({
                    "available_databases": self.catalog.names(),
                    "hint": "Add a 'database' parameter or set 'default_database' in the configuration",
                })),
        )
    }

    fn single_database(&self) -> Option<String> {
        if self.catalog.len() == 1 {
            self.catalog.first_name().map(str::to_string)
        } else {
            None
        }
    }

    /// Fetch the schema snapshot, loading through the adapter on miss.
    async fn get_schema(&self, database: &str) -> Result<Arc<DatabaseSchema>, GatewayError> {
        if let Some(schema) = self.schema_cache.get(database) {
            debug!(database, version = schema.version, "schema cache hit");
            return Ok(schema);
        }

        let entry = self.catalog.get(database).ok_or_else(|| {
            GatewayError::database(format!(
                "No connection pool available for database '{database}'"
            ))
            .with_details(json!({ "database": database }))
        })?;

        self.schema_cache
            .load(database, entry.schema_source.as_ref())
            .await
            .map_err(|err| {
                GatewayError::schema_load(format!(
                    "Failed to load schema for database '{database}': {err}"
                ))
                .with_details(json!({
                    "database": database,
                    "error": err.message,
                }))
            })
    }

    /// Generate SQL, re-prompting with validator feedback on rejection.
    ///
    /// The circuit breaker is consulted once per request; a request
    /// either runs all of its attempts or none of them. Validation
    /// rejections are the only retried errors. Provider failures keep
    /// their own error codes and end the request; anything unexpected
    /// counts one breaker failure and surfaces as an `llm_error`.
    async fn generate_with_retry(
        &self,
        request_id: Uuid,
        question: &str,
        schema: &DatabaseSchema,
    ) -> Result<(String, ValidationResult, Option<u32>), GatewayError> {
        if !self.breaker.allow_request() {
            self.metrics.increment_llm_call("sql_generation_circuit_open");
            return Err(GatewayError::llm(
                "SQL generation service is temporarily unavailable (circuit breaker open)",
            )
            .with_details(json!({
                "circuit_state": self.breaker.state().as_str(),
                "failure_count": self.breaker.failure_count(),
            })));
        }

        let max_retries = self.config.resilience.max_retries;
        let mut previous_sql: Option<String> = None;
        let mut error_feedback: Option<String> = None;
        let mut attempt: u32 = 0;

        loop {
            let _slot = match self.acquire_llm_slot().await {
                Ok(slot) => slot,
                Err(err) => {
                    self.metrics
                        .increment_llm_call("sql_generation_rate_limited");
                    return Err(err);
                }
            };

            let llm_started = Instant::now();
            let generated = match self
                .generator
                .generate(
                    question,
                    schema,
                    previous_sql.as_deref(),
                    error_feedback.as_deref(),
                )
                .await
            {
                Ok(generated) => generated,
                Err(err) if err.is_llm() => return Err(err),
                Err(err) => {
                    self.breaker.record_failure();
                    self.metrics.increment_llm_call("sql_generation_error");
                    return Err(GatewayError::llm(format!(
                        "SQL generation failed unexpectedly: {err}"
                    ))
                    .with_details(json!({ "error_type": err.kind.code() })));
                }
            };
            self.metrics.increment_llm_call("sql_generation");
            self.metrics
                .observe_llm_latency("sql_generation", llm_started.elapsed().as_secs_f64());
            if let Some(tokens) = generated.tokens_used {
                self.metrics
                    .increment_llm_tokens("sql_generation", u64::from(tokens));
            }

            let rejection = match self.validator.validate_or_raise(&generated.sql) {
                Ok(()) => {
                    self.breaker.record_success();
                    info!(%request_id, attempt, "generated SQL passed validation");
                    return Ok((
                        generated.sql,
                        ValidationResult::all_clear(),
                        generated.tokens_used,
                    ));
                }
                Err(rejection) => rejection,
            };

            self.metrics
                .increment_sql_rejected(rejection.kind.code());
            warn!(
                %request_id,
                attempt,
                error = %rejection,
                "generated SQL rejected by validation"
            );

            if attempt >= max_retries {
                self.breaker.record_failure();
                return Err(rejection);
            }
            attempt += 1;
            previous_sql = Some(generated.sql);
            error_feedback = Some(rejection.message);
        }
    }

    /// Score executed results against the question, never failing the
    /// request over it.
    async fn score_results(
        &self,
        request_id: Uuid,
        question: &str,
        sql: &str,
        result: &QueryResult,
    ) -> u8 {
        let Some(validator) = &self.result_validator else {
            return 100;
        };
        match validator.validate(question, sql, result).await {
            Ok(verdict) => {
                if !verdict.is_acceptable {
                    warn!(
                        %request_id,
                        confidence = verdict.confidence,
                        explanation = %verdict.explanation,
                        "result validation below threshold"
                    );
                }
                verdict.confidence
            }
            Err(err) => {
                warn!(%request_id, error = %err, "result validation failed, assuming acceptable");
                100
            }
        }
    }

    async fn acquire_query_slot(&self) -> Result<Option<RatePermit>, GatewayError> {
        let Some(limiter) = &self.limiter else {
            return Ok(None);
        };
        match limiter.for_queries(self.rate_limit_wait()).await {
            Ok(permit) => Ok(Some(permit)),
            Err(_) => Err(GatewayError::rate_limited(
                "Rate limit exceeded. Too many concurrent requests.",
            )
            .with_details(json!({
                "timeout_seconds": self.config.resilience.rate_limit_timeout_seconds,
            }))),
        }
    }

    async fn acquire_llm_slot(&self) -> Result<Option<RatePermit>, GatewayError> {
        let Some(limiter) = &self.limiter else {
            return Ok(None);
        };
        match limiter.for_llm(self.rate_limit_wait()).await {
            Ok(permit) => Ok(Some(permit)),
            Err(_) => Err(GatewayError::llm(
                "LLM rate limit exceeded. Too many concurrent LLM calls.",
            )
            .with_details(json!({
                "timeout_seconds": self.config.resilience.rate_limit_timeout_seconds,
            }))),
        }
    }

    fn rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.config.resilience.rate_limit_timeout_seconds)
    }
}
