use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::store::{CertificationStore, ProgramCertificateStore};
use crate::db::row_parsers::json_object_text;
use crate::errors::AppError;
use crate::models::certification::{CertificateAttributes, ProductCertification, ProgramCertificate};

const ASSIGNMENT_SELECT: &str = r#"
    SELECT pc.id AS pc_id, pc.product_id AS pc_product_id, pc.certificate_no, pc.issue_date,
           pc.expiry_date, pc.document_file, pc.meta_json, pc.updated_at AS pc_updated_at,
           c.id AS c_id, c.name AS c_name, c.image AS c_image,
           prog.id AS prog_id, prog.code AS prog_code, prog.name AS prog_name,
           cs.id AS cs_id, cs.code AS cs_code, cs.name AS cs_name
    FROM product_has_certification pc
    JOIN certifications c ON c.id = pc.certification_id
    JOIN lkp_product_program prog ON prog.id = c.program_id
    LEFT JOIN lkp_cert_status cs ON cs.id = pc.status_id
    WHERE pc.product_id = "#;

const PROGRAM_COLUMNS: &str = r#"
    SELECT pc.id AS pc_id, pc.created_at AS pc_created_at, pc.updated_at AS pc_updated_at,
           pc.certificate_no, pc.issue_date, pc.expiry_date, pc.document_file, pc.meta_json,
           p.id AS p_id, p.name AS p_name, p.slug AS p_slug,
           b.id AS b_id, b.name AS b_name, b.slug AS b_slug,
           bc.id AS bc_id, bc.name AS bc_name, bc.slug AS bc_slug,
           co.id AS co_id, co.name AS co_name, co.slug AS co_slug,
           c.id AS c_id, c.name AS c_name, c.image AS c_image,
           prog.id AS prog_id, prog.code AS prog_code, prog.name AS prog_name,
           cs.id AS cs_id, cs.code AS cs_code, cs.name AS cs_name"#;

const PROGRAM_FROM: &str = r#"
    FROM product_has_certification pc
    JOIN products p ON p.id = pc.product_id
    JOIN certifications c ON c.id = pc.certification_id
    JOIN lkp_product_program prog ON prog.id = c.program_id
    JOIN brands b ON b.id = p.brand_id
    JOIN brand_categories bc ON bc.id = b.brand_category_id
    JOIN companies co ON co.id = p.company_id
    LEFT JOIN lkp_cert_status cs ON cs.id = pc.status_id
    WHERE prog.code = "#;

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// SQLite-backed implementation of both certification stores.
#[derive(Clone)]
pub struct SqliteCertificationRepository {
    pool: SqlitePool,
}

impl SqliteCertificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// `%term%` with LIKE wildcards in the term escaped by `\`.
///
/// SQLite's `LIKE` folds ASCII letters only, so `ÉCO` does not match `éco`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Program code plus the optional search clause, shared by count and page queries.
fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, program: &str, search: Option<&str>) {
    qb.push_bind(program.to_string());

    if let Some(term) = search {
        let pattern = like_pattern(term);
        qb.push(" AND (p.name LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR COALESCE(pc.certificate_no, '') LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR co.name LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR c.name LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }
}

fn date_text(date: Option<chrono::NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

#[async_trait]
impl CertificationStore for SqliteCertificationRepository {
    async fn product_id(&self, slug: &str) -> Result<Option<i64>, AppError> {
        Ok(sqlx::query_scalar("SELECT id FROM products WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn certification_exists(&self, certification_id: i64) -> Result<bool, AppError> {
        let found: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM certifications WHERE id = ?)")
            .bind(certification_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }

    async fn status_exists(&self, status_id: i64) -> Result<bool, AppError> {
        let found: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM lkp_cert_status WHERE id = ?)")
            .bind(status_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }

    async fn count(&self, product_id: i64) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM product_has_certification WHERE product_id = ?")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list(&self, product_id: i64, limit: i64, offset: i64) -> Result<Vec<ProductCertification>, AppError> {
        let sql = format!("{ASSIGNMENT_SELECT} ? ORDER BY c.name, c.id LIMIT ? OFFSET ?");
        let rows = sqlx::query(&sql)
            .bind(product_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(ProductCertification::from_row).collect()
    }

    async fn find(&self, product_id: i64, certification_id: i64) -> Result<Option<ProductCertification>, AppError> {
        let sql = format!("{ASSIGNMENT_SELECT} ? AND pc.certification_id = ?");
        let row = sqlx::query(&sql)
            .bind(product_id)
            .bind(certification_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ProductCertification::from_row).transpose()
    }

    async fn insert(&self, product_id: i64, certification_id: i64, attributes: &CertificateAttributes) -> Result<(), AppError> {
        let meta = attributes.meta_or_empty();
        sqlx::query(
            r#"
            INSERT INTO product_has_certification
                (product_id, certification_id, certificate_no, issue_date, expiry_date, status_id, document_file, meta_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product_id)
        .bind(certification_id)
        .bind(&attributes.certificate_no)
        .bind(date_text(attributes.issue_date))
        .bind(date_text(attributes.expiry_date))
        .bind(attributes.status_id)
        .bind(&attributes.document_file)
        .bind(json_object_text(Some(&meta)))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, product_id: i64, certification_id: i64, attributes: &CertificateAttributes) -> Result<bool, AppError> {
        let meta = attributes.meta_or_empty();
        let sql = format!(
            r#"
            UPDATE product_has_certification
            SET certificate_no = ?, issue_date = ?, expiry_date = ?, status_id = ?,
                document_file = ?, meta_json = ?, updated_at = {NOW}
            WHERE product_id = ? AND certification_id = ?
            "#
        );
        let result = sqlx::query(&sql)
            .bind(&attributes.certificate_no)
            .bind(date_text(attributes.issue_date))
            .bind(date_text(attributes.expiry_date))
            .bind(attributes.status_id)
            .bind(&attributes.document_file)
            .bind(json_object_text(Some(&meta)))
            .bind(product_id)
            .bind(certification_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, product_id: i64, certification_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM product_has_certification WHERE product_id = ? AND certification_id = ?")
            .bind(product_id)
            .bind(certification_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProgramCertificateStore for SqliteCertificationRepository {
    async fn product_program_code(&self, slug: &str) -> Result<Option<String>, AppError> {
        Ok(sqlx::query_scalar(
            "SELECT prog.code FROM products p JOIN lkp_product_program prog ON prog.id = p.program_id WHERE p.slug = ?",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn certification_program_code(&self, certification_id: i64) -> Result<Option<String>, AppError> {
        Ok(sqlx::query_scalar(
            "SELECT prog.code FROM certifications c JOIN lkp_product_program prog ON prog.id = c.program_id WHERE c.id = ?",
        )
        .bind(certification_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn count(&self, program: &str, search: Option<&str>) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        qb.push(PROGRAM_FROM);
        push_scope(&mut qb, program, search);

        Ok(qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?)
    }

    async fn list(&self, program: &str, search: Option<&str>, limit: i64, offset: i64) -> Result<Vec<ProgramCertificate>, AppError> {
        let mut qb = QueryBuilder::<Sqlite>::new(PROGRAM_COLUMNS);
        qb.push(PROGRAM_FROM);
        push_scope(&mut qb, program, search);
        qb.push(" ORDER BY pc.updated_at DESC, pc.id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(ProgramCertificate::from_row).collect()
    }

    async fn find(&self, program: &str, product_slug: &str, certification_id: i64) -> Result<Option<ProgramCertificate>, AppError> {
        let mut qb = QueryBuilder::<Sqlite>::new(PROGRAM_COLUMNS);
        qb.push(PROGRAM_FROM);
        push_scope(&mut qb, program, None);
        qb.push(" AND p.slug = ");
        qb.push_bind(product_slug.to_string());
        qb.push(" AND c.id = ");
        qb.push_bind(certification_id);

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(ProgramCertificate::from_row).transpose()
    }
}
