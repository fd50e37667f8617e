//! PostgreSQL store tests. Run with `DATABASE_URL` set and `--ignored`.

use chrono::{DateTime, Timelike, Utc};
use sqlx::{Pool, Postgres};

use portlink_tracker::{
    database::Database,
    geo::Coordinate,
    models::{VesselId, VesselState, VesselUpdate, Weather},
    store::{VesselStore, WriteOutcome},
};

fn vessel(id: &str) -> VesselState {
    VesselState::departing(
        VesselId::try_from(id).unwrap(),
        Coordinate::new(22.3072, 73.1812).unwrap(),
        Coordinate::new(41.3851, 2.1734).unwrap(),
        Utc::now().with_nanosecond(0).unwrap(),
    )
}

fn update(sample_time: DateTime<Utc>) -> VesselUpdate {
    VesselUpdate {
        location: Coordinate::new(14.5, 52.0).unwrap(),
        region: "Arabian Sea".to_string(),
        speed: 13.4,
        weather: Weather::Stormy,
        progress: 24.0,
        estimated_arrival: Some(sample_time + chrono::Duration::hours(200)),
        sample_time,
    }
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = false)]
async fn test_insert_and_get_vessel(pool: Pool<Postgres>) {
    let db = Database::new(pool).await.unwrap();
    let state = vessel("pg-insert");

    db.insert_vessel(&state).await.unwrap();

    let stored = db.get(&state.id).await.unwrap().unwrap();
    assert_eq!(stored, state);
    assert!(db
        .get(&VesselId::try_from("pg-missing").unwrap())
        .await
        .unwrap()
        .is_none());
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = false)]
async fn test_update_position_is_fenced(pool: Pool<Postgres>) {
    let db = Database::new(pool.clone()).await.unwrap();
    let state = vessel("pg-fence");
    db.insert_vessel(&state).await.unwrap();

    let newer = state.departed_at + chrono::Duration::hours(2);
    let older = state.departed_at + chrono::Duration::hours(1);

    assert_eq!(
        db.update_position(&state.id, &update(newer)).await.unwrap(),
        WriteOutcome::Applied
    );
    assert_eq!(
        db.update_position(&state.id, &update(older)).await.unwrap(),
        WriteOutcome::Stale
    );
    assert_eq!(
        db.update_position(&VesselId::try_from("pg-ghost").unwrap(), &update(newer))
            .await
            .unwrap(),
        WriteOutcome::Missing
    );

    // Verify the stored row
    let stored: (f64, f64, String, Option<DateTime<Utc>>) = sqlx::query_as(
        "SELECT latitude, longitude, weather, last_sample_at FROM vessels WHERE id = $1",
    )
    .bind(state.id.as_str())
    .fetch_one(&pool)
    .await
    .expect("Failed to retrieve vessel");

    assert_eq!(stored.0, 14.5);
    assert_eq!(stored.1, 52.0);
    assert_eq!(stored.2, "Stormy");
    assert_eq!(stored.3, Some(newer));
}
