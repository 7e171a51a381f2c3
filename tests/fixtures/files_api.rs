/// Upload and download endpoints
#[path("files")]
pub trait FilesApi {
    /// @summary Upload a document
    #[post]
    fn upload(&self, #[file_param("document")] document: Vec<u8>, #[form_param] label: String);

    #[get("/:name")]
    fn download(&self, #[path_param] name: String, #[context_request] request: HttpRequest) -> Vec<u8>;
}
