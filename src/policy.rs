use crate::{
    auth::AuthUser,
    error::BookingError,
    models::{AppointmentRow, LocationRow, ResultRow, ReviewRow, ServiceReviewRow, ServiceRow},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Client(AuthUser),
    Staff(AuthUser),
}

impl Actor {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Actor::Anonymous => None,
            Actor::Client(user) | Actor::Staff(user) => Some(user),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user().map(|user| user.id.as_str())
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::Staff(_))
    }

    /// The authenticated user, or `Unauthenticated` for anonymous callers.
    pub fn require_user(&self) -> Result<&AuthUser, BookingError> {
        self.user().ok_or(BookingError::Unauthenticated)
    }

    pub fn require_staff(&self) -> Result<&AuthUser, BookingError> {
        match self {
            Actor::Staff(user) => Ok(user),
            Actor::Client(_) => Err(BookingError::Ownership(
                "Staff access required.".to_string(),
            )),
            Actor::Anonymous => Err(BookingError::Unauthenticated),
        }
    }
}

impl From<AuthUser> for Actor {
    fn from(user: AuthUser) -> Self {
        if user.is_staff {
            Actor::Staff(user)
        } else {
            Actor::Client(user)
        }
    }
}

/// Records that belong to exactly one user.
pub trait Owned {
    fn owner_id(&self) -> &str;

    fn is_owned_by(&self, actor: &Actor) -> bool {
        actor.user_id() == Some(self.owner_id())
    }
}

impl Owned for AppointmentRow {
    fn owner_id(&self) -> &str {
        &self.client_id
    }
}

impl Owned for ReviewRow {
    // Reached through the appointment the review is attached to.
    fn owner_id(&self) -> &str {
        &self.client_id
    }
}

impl Owned for ServiceReviewRow {
    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Read,
    /// Owner-level mutation, e.g. canceling one's own appointment.
    Write,
    /// Staff-only: status, admin notes, notified flag, publication.
    Administer,
}

#[derive(Clone, Copy, Debug)]
pub enum Record<'a> {
    Service(&'a ServiceRow),
    Location(&'a LocationRow),
    Appointment(&'a AppointmentRow),
    Review(&'a ReviewRow),
    ServiceReview(&'a ServiceReviewRow),
    Result(&'a ResultRow),
}

pub fn can_access(actor: &Actor, record: Record<'_>, intent: Intent) -> bool {
    if actor.is_staff() {
        return true;
    }

    match record {
        Record::Service(service) => intent == Intent::Read && service.is_active,
        Record::Location(location) => intent == Intent::Read && location.is_active,
        Record::Appointment(appointment) => owner_access(actor, appointment, intent),
        Record::Review(review) => {
            owner_access(actor, review, intent)
                || (intent == Intent::Read && review.is_published && actor.user().is_some())
        }
        Record::ServiceReview(review) => {
            owner_access(actor, review, intent) || (intent == Intent::Read && review.is_published)
        }
        Record::Result(result) => intent == Intent::Read && result.is_published,
    }
}

fn owner_access(actor: &Actor, record: &impl Owned, intent: Intent) -> bool {
    intent != Intent::Administer && record.is_owned_by(actor)
}

/// Explicit denial for single-record mutations.
pub fn authorize(actor: &Actor, record: Record<'_>, intent: Intent) -> Result<(), BookingError> {
    if can_access(actor, record, intent) {
        return Ok(());
    }
    match (actor, intent) {
        (Actor::Anonymous, _) => Err(BookingError::Unauthenticated),
        (_, Intent::Administer) => Err(BookingError::Ownership(
            "Staff access required.".to_string(),
        )),
        _ => Err(BookingError::Ownership(
            "You can only manage your own records.".to_string(),
        )),
    }
}
