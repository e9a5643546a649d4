//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the Sleuth API, served at
//! `/api-docs/openapi.json` with Swagger UI at `/docs`.

use utoipa::OpenApi;

use crate::handlers::{
    AggregateRequest, DuplicateResponse, FindingInput, FindingResponse, HealthResponse,
    QueryRequest, QueryResponse, ReadyResponse, RegistrationResponse, ScanResponse,
    SignalResponse, StatsResponse, VerdictResponse,
};

/// Sleuth API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sleuth API",
        version = "0.1.0",
        description = r#"
## Fraud forensics for uploaded documents and images

Every upload is checked by independent forensic signals:

- **Duplicate detection** - text embeddings and perceptual image hashes
  against everything submitted before
- **PII** - PAN and Aadhaar identifiers in the text
- **Metadata** - PDF creation date later than any date in the document
- **Tampering** - editing-tool fingerprints and error level analysis

Findings are combined into a fraud score (0-100) and a severity band
(NONE, LOW, MEDIUM, HIGH).

### Endpoints

1. **Scan** an upload via `POST /scan`; it is registered for future checks
2. **Look up** duplicates without registering via `POST /duplicates/query`
3. **Score** findings from other systems via `POST /aggregate`
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Scanning", description = "Scan uploads and look up duplicates"),
        (name = "Scoring", description = "Aggregate findings into a fraud verdict"),
        (name = "Health", description = "Service health, readiness and index statistics")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::stats::stats_handler,
        crate::handlers::scan::scan_handler,
        crate::handlers::query::query_handler,
        crate::handlers::aggregate::aggregate_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            StatsResponse,
            ScanResponse,
            VerdictResponse,
            FindingResponse,
            DuplicateResponse,
            RegistrationResponse,
            SignalResponse,
            QueryRequest,
            QueryResponse,
            AggregateRequest,
            FindingInput,
        )
    )
)]
pub struct ApiDoc;
