//! In-memory certification stores for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::store::{CertificationStore, ProgramCertificateStore};
use crate::errors::AppError;
use crate::models::catalog::{Certification, Program};
use crate::models::certification::{
    BrandRef, CertificateAttributes, NamedRef, ProductCertification, ProgramCertificate,
};

pub const GREEN_LABEL: &str = "green_label";
pub const GREEN_TOLL: &str = "green_toll";

struct Product {
    id: i64,
    slug: String,
    program: String,
}

struct Cert {
    id: i64,
    name: String,
    program: String,
}

struct Assignment {
    id: i64,
    product_id: i64,
    certification_id: i64,
    attributes: CertificateAttributes,
    written: u64,
}

#[derive(Default)]
struct State {
    products: Vec<Product>,
    certifications: Vec<Cert>,
    assignments: Vec<Assignment>,
    next_id: i64,
    clock: u64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn product(&self, id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    fn certification(&self, id: i64) -> Option<&Cert> {
        self.certifications.iter().find(|c| c.id == id)
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<State>,
    inserts: AtomicUsize,
    hide_program_view: AtomicBool,
}

fn program(code: &str) -> Program {
    Program {
        id: if code == GREEN_LABEL { 1 } else { 2 },
        code: code.to_string(),
        name: code.replace('_', " "),
    }
}

fn certification(cert: &Cert) -> Certification {
    Certification {
        id: cert.id,
        name: cert.name.clone(),
        image: None,
        program: program(&cert.program),
    }
}

impl FakeCatalog {
    pub fn add_product(&self, slug: &str, program: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.products.push(Product {
            id,
            slug: slug.to_string(),
            program: program.to_string(),
        });
        id
    }

    pub fn add_certification(&self, name: &str, program: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.certifications.push(Cert {
            id,
            name: name.to_string(),
            program: program.to_string(),
        });
        id
    }

    pub fn assign(&self, slug: &str, certification_id: i64) {
        let mut state = self.state.lock().unwrap();
        let product_id = state.products.iter().find(|p| p.slug == slug).map(|p| p.id).unwrap();
        let id = state.next_id();
        let written = state.tick();
        state.assignments.push(Assignment {
            id,
            product_id,
            certification_id,
            attributes: CertificateAttributes::default(),
            written,
        });
    }

    pub fn assignment_count(&self) -> usize {
        self.state.lock().unwrap().assignments.len()
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Makes every program-view lookup miss.
    pub fn hide_program_view(&self) {
        self.hide_program_view.store(true, Ordering::SeqCst);
    }

    fn product_view(state: &State, row: &Assignment) -> ProductCertification {
        let cert = state.certification(row.certification_id).unwrap();
        ProductCertification {
            id: row.id,
            product_id: row.product_id,
            certification: certification(cert),
            certificate_no: row.attributes.certificate_no.clone(),
            issue_date: row.attributes.issue_date,
            expiry_date: row.attributes.expiry_date,
            status: None,
            document_file: row.attributes.document_file.clone(),
            meta: row.attributes.meta_or_empty(),
            updated_at: Utc::now(),
        }
    }

    fn program_view(state: &State, row: &Assignment) -> ProgramCertificate {
        let product = state.product(row.product_id).unwrap();
        let cert = state.certification(row.certification_id).unwrap();
        let named = |id: i64, name: &str| NamedRef {
            id,
            name: name.to_string(),
            slug: name.to_lowercase(),
        };
        ProgramCertificate {
            id: row.id,
            program: program(&cert.program),
            product: NamedRef {
                id: product.id,
                name: product.slug.clone(),
                slug: product.slug.clone(),
            },
            brand: BrandRef {
                id: 1,
                name: "Brand".into(),
                slug: "brand".into(),
                category: named(1, "Paints"),
            },
            company: named(1, "Acme"),
            certification: certification(cert),
            certificate_no: row.attributes.certificate_no.clone(),
            issue_date: row.attributes.issue_date,
            expiry_date: row.attributes.expiry_date,
            status: None,
            document_file: row.attributes.document_file.clone(),
            meta: row.attributes.meta_or_empty(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn matching<'a>(state: &'a State, code: &str, search: Option<&str>) -> Vec<&'a Assignment> {
        let needle = search.map(str::to_lowercase);
        let mut rows: Vec<&Assignment> = state
            .assignments
            .iter()
            .filter(|row| state.certification(row.certification_id).is_some_and(|c| c.program == code))
            .filter(|row| match &needle {
                None => true,
                Some(needle) => {
                    let product = state.product(row.product_id).map(|p| p.slug.to_lowercase()).unwrap_or_default();
                    let cert = state.certification(row.certification_id).map(|c| c.name.to_lowercase()).unwrap_or_default();
                    let number = row.attributes.certificate_no.clone().unwrap_or_default().to_lowercase();
                    [product, cert, number, "acme".to_string()].iter().any(|v| v.contains(needle.as_str()))
                }
            })
            .collect();
        rows.sort_by(|a, b| b.written.cmp(&a.written).then(b.id.cmp(&a.id)));
        rows
    }
}

#[async_trait]
impl CertificationStore for FakeCatalog {
    async fn product_id(&self, slug: &str) -> Result<Option<i64>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.products.iter().find(|p| p.slug == slug).map(|p| p.id))
    }

    async fn certification_exists(&self, certification_id: i64) -> Result<bool, AppError> {
        Ok(self.state.lock().unwrap().certification(certification_id).is_some())
    }

    async fn status_exists(&self, status_id: i64) -> Result<bool, AppError> {
        Ok(status_id == 1)
    }

    async fn count(&self, product_id: i64) -> Result<i64, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.assignments.iter().filter(|a| a.product_id == product_id).count() as i64)
    }

    async fn list(&self, product_id: i64, limit: i64, offset: i64) -> Result<Vec<ProductCertification>, AppError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<&Assignment> = state.assignments.iter().filter(|a| a.product_id == product_id).collect();
        rows.sort_by_key(|a| state.certification(a.certification_id).map(|c| c.name.clone()));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|row| Self::product_view(&state, row))
            .collect())
    }

    async fn find(&self, product_id: i64, certification_id: i64) -> Result<Option<ProductCertification>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .assignments
            .iter()
            .find(|a| a.product_id == product_id && a.certification_id == certification_id)
            .map(|row| Self::product_view(&state, row)))
    }

    async fn insert(&self, product_id: i64, certification_id: i64, attributes: &CertificateAttributes) -> Result<(), AppError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state
            .assignments
            .iter()
            .any(|a| a.product_id == product_id && a.certification_id == certification_id)
        {
            return Err(AppError::conflict("record already exists"));
        }
        let id = state.next_id();
        let written = state.tick();
        state.assignments.push(Assignment {
            id,
            product_id,
            certification_id,
            attributes: attributes.clone(),
            written,
        });
        Ok(())
    }

    async fn update(&self, product_id: i64, certification_id: i64, attributes: &CertificateAttributes) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let written = state.tick();
        match state
            .assignments
            .iter_mut()
            .find(|a| a.product_id == product_id && a.certification_id == certification_id)
        {
            Some(row) => {
                row.attributes = attributes.clone();
                row.written = written;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, product_id: i64, certification_id: i64) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let before = state.assignments.len();
        state
            .assignments
            .retain(|a| !(a.product_id == product_id && a.certification_id == certification_id));
        Ok(state.assignments.len() < before)
    }
}

#[async_trait]
impl ProgramCertificateStore for FakeCatalog {
    async fn product_program_code(&self, slug: &str) -> Result<Option<String>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.products.iter().find(|p| p.slug == slug).map(|p| p.program.clone()))
    }

    async fn certification_program_code(&self, certification_id: i64) -> Result<Option<String>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .certification(certification_id)
            .map(|c| c.program.clone()))
    }

    async fn count(&self, program: &str, search: Option<&str>) -> Result<i64, AppError> {
        let state = self.state.lock().unwrap();
        Ok(Self::matching(&state, program, search).len() as i64)
    }

    async fn list(&self, program: &str, search: Option<&str>, limit: i64, offset: i64) -> Result<Vec<ProgramCertificate>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(Self::matching(&state, program, search)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|row| Self::program_view(&state, row))
            .collect())
    }

    async fn find(&self, program: &str, product_slug: &str, certification_id: i64) -> Result<Option<ProgramCertificate>, AppError> {
        if self.hide_program_view.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let state = self.state.lock().unwrap();
        let product_id = match state.products.iter().find(|p| p.slug == product_slug) {
            Some(p) => p.id,
            None => return Ok(None),
        };
        Ok(Self::matching(&state, program, None)
            .into_iter()
            .find(|a| a.product_id == product_id && a.certification_id == certification_id)
            .map(|row| Self::program_view(&state, row)))
    }
}
