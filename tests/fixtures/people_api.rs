//! People service declarations.

pub mod models {
    /// A person
    pub struct Person {
        pub name: String,
        #[is_int]
        pub age: f64,
    }

    #[serde(rename_all = "lowercase")]
    pub enum Status {
        Active,
        Banned,
    }

    /// One page of results
    pub struct Page<T> {
        pub items: Vec<T>,
        pub total: u64,
    }
}

pub mod admin {
    /// Audit trail entry
    pub struct Audit {
        pub at: chrono::DateTime<chrono::Utc>,
        pub actor: Option<String>,
        /// Record touched by the change
        pub subject: models::Person,
    }
}

/// Endpoints for people
#[path("/people")]
#[tags("people")]
pub struct PeopleController;

impl PeopleController {
    /// Fetch a person by id
    #[get]
    #[path(":id")]
    pub fn get_person(&self, #[path_param] id: String) -> Vec<models::Person> {
        todo!()
    }

    #[get]
    pub fn list(
        &self,
        #[query_param] status: Option<models::Status>,
        #[query_param("pageNumber", default = 1)] page: Option<i32>,
    ) -> models::Page<models::Person> {
        todo!()
    }

    #[post]
    #[response(409, "Already registered")]
    pub fn create(&self, person: models::Person) -> NewResource<models::Person> {
        todo!()
    }

    #[delete("/:id")]
    #[security("admin", "oauth")]
    pub fn remove(&self, #[path_param] id: String) {}

    #[get("/audits")]
    #[produces("application/json")]
    pub fn audits(&self) -> Vec<admin::Audit> {
        todo!()
    }

    #[get("/internal")]
    #[hidden]
    pub fn internal(&self) -> String {
        todo!()
    }
}
