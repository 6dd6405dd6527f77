use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, Schema, SqlErr,
};
use tracing::info;

use crate::{
    domain::{
        error::RepositoryError,
        models::{
            avatar::StorageRef,
            credential::HashedPassword,
            draft::{Coordinates, LocationGrant},
            user::{NewUser, Profile, ProfileUpdate, UserId, UserRecord},
        },
        repositories::user_repository::UserRepository,
    },
    infrastructure::entity::users,
};

#[derive(Clone)]
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect and make sure the `users` table exists.
    pub async fn connect(url: &str) -> Result<Self, RepositoryError> {
        let mut opt = ConnectOptions::new(url.to_string());
        opt.max_connections(10)
            .min_connections(1)
            .sqlx_logging(true);
        // every sqlite memory connection is its own database
        if url.contains(":memory:") {
            opt.max_connections(1);
        }

        let db = Database::connect(opt).await.map_err(db_error)?;
        let repository = Self::new(db);
        repository.ensure_schema().await?;
        info!(backend = ?repository.db.get_database_backend(), "user repository ready");
        Ok(repository)
    }

    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let backend = self.db.get_database_backend();
        let mut table = Schema::new(backend).create_table_from_entity(users::Entity);
        table.if_not_exists();
        self.db
            .execute(backend.build(&table))
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

fn db_error(e: DbErr) -> RepositoryError {
    RepositoryError::DatabaseError(e.to_string())
}

fn into_record(model: users::Model) -> Result<UserRecord, RepositoryError> {
    let avatar_ref = model
        .avatar_ref
        .as_deref()
        .map(StorageRef::parse)
        .transpose()
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

    let location = match (model.location_enabled, model.latitude, model.longitude) {
        (true, Some(latitude), Some(longitude)) => LocationGrant::Enabled(Coordinates {
            latitude,
            longitude,
        }),
        _ => LocationGrant::Disabled,
    };

    let profile = Profile::reconstruct(
        UserId::from_uuid(model.id),
        model.email,
        model.full_name,
        avatar_ref,
        location,
        model.created_at,
        model.updated_at,
    );

    Ok(UserRecord {
        profile,
        password_hash: HashedPassword::new(model.password_hash),
    })
}

fn set_location(active: &mut users::ActiveModel, location: LocationGrant) {
    let coordinates = location.coordinates();
    active.location_enabled = Set(location.is_enabled());
    active.latitude = Set(coordinates.map(|c| c.latitude));
    active.longitude = Set(coordinates.map(|c| c.longitude));
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn create(&self, user: NewUser) -> Result<Profile, RepositoryError> {
        let now = Utc::now();
        let mut active = users::ActiveModel {
            id: Set(*UserId::new().as_uuid()),
            email: Set(user.email),
            full_name: Set(user.full_name),
            password_hash: Set(user.password_hash.as_str().to_string()),
            avatar_ref: Set(user.avatar_ref.map(|r| r.as_str().to_string())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        set_location(&mut active, user.location);

        let model = active.insert(&self.db).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => RepositoryError::Duplicate,
            _ => db_error(e),
        })?;

        Ok(into_record(model)?.profile)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(into_record)
            .transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let record = users::Entity::find_by_id(*id.as_uuid())
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(into_record)
            .transpose()?;
        Ok(record.map(|r| r.profile))
    }

    async fn update(&self, id: UserId, update: ProfileUpdate) -> Result<Profile, RepositoryError> {
        let model = users::Entity::find_by_id(*id.as_uuid())
            .one(&self.db)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: users::ActiveModel = model.into();
        if let Some(full_name) = update.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(avatar_ref) = update.avatar_ref {
            active.avatar_ref = Set(Some(avatar_ref.as_str().to_string()));
        }
        if let Some(location) = update.location {
            set_location(&mut active, location);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await.map_err(db_error)?;
        Ok(into_record(model)?.profile)
    }
}
