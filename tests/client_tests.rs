//! Dashboard client cache against a live server on a loopback port.

use std::sync::Arc;

use serde_json::json;

use doctorados::api::{build_router, AppState};
use doctorados::client::DashboardClient;
use doctorados::db::MemoryStore;
use doctorados::error::AppError;
use doctorados::models::{NewProgram, RatingFilter, Status, TableFilter};
use doctorados::search::SearchParams;
use doctorados::App;

async fn spawn_server() -> String {
    let router = build_router(AppState::new(App::new(Arc::new(MemoryStore::new()))));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn writes_refresh_the_cache() {
    let mut client = DashboardClient::new(&spawn_server().await).unwrap();
    client.refresh().await.unwrap();
    assert!(client.programs().is_empty());

    let zaragoza = client
        .create_program(&NewProgram::new("Universidad de Zaragoza", "Zaragoza", "Historia"))
        .await
        .unwrap();
    client
        .create_program(&NewProgram::new("Universidad de Alicante", "Alicante", "Turismo"))
        .await
        .unwrap();

    assert_eq!(client.programs().len(), 2);
    let names: Vec<_> = client.universities().iter().map(|u| u.nombre.as_str()).collect();
    assert_eq!(names, vec!["Universidad de Alicante", "Universidad de Zaragoza"]);

    client.rate(&zaragoza.id, 5).await.unwrap();
    client.set_status(&zaragoza.id, Status::Interesado).await.unwrap();

    let rated = client.filter(&TableFilter {
        rating: RatingFilter::Rated,
        status: None,
    });
    assert_eq!(rated.len(), 1);
    assert_eq!(rated[0].id, zaragoza.id);

    let interesados = client.filter(&TableFilter {
        rating: RatingFilter::All,
        status: Some(Status::Interesado),
    });
    assert_eq!(interesados.len(), 1);

    let unrated = client.filter(&TableFilter {
        rating: RatingFilter::Unrated,
        status: None,
    });
    assert_eq!(unrated[0].programa, "Turismo");

    client.delete_program(&zaragoza.id).await.unwrap();
    assert_eq!(client.programs().len(), 1);
    assert_eq!(client.universities().len(), 1);
}

#[tokio::test]
async fn errors_carry_server_messages() {
    let mut client = DashboardClient::new(&spawn_server().await).unwrap();

    let err = client
        .create_program(&NewProgram::new("Universidad de Alicante", "", "Turismo"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m.contains("requeridos")));

    let err = client
        .update_program("000000000000000000000000", &json!({"status": "aplicando"}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn search_goes_to_the_server() {
    let mut client = DashboardClient::new(&spawn_server().await).unwrap();
    client
        .create_program(
            &NewProgram::new("Universidad de Alicante", "Alicante", "Turismo")
                .with_lines("Turismo sostenible"),
        )
        .await
        .unwrap();

    let result = client
        .search(&SearchParams {
            texto: Some("sostenible".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.termino_busqueda, "sostenible");
}
