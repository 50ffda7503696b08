use tracing::info;

use crate::error::ScheduleError;
use crate::runner::Transactor;
use crate::store::{Store, StoreTransaction, TransactionMode};
use crate::subspace::Subspace;
use crate::tuple::Element;
use crate::types::Key;

/// The class-scheduling service.
///
/// Holds the namespace handed out by the store's directory service and the
/// two region subspaces carved from it: `class` for seat counts and `attends`
/// for enrollment markers. All operations run through a [`Transactor`], so a
/// caller can execute each one as its own retried transaction or compose
/// several into a single atomic unit.
#[derive(Debug, Clone)]
pub struct Scheduler {
    root: Subspace,
    classes: Subspace,
    attendance: Subspace,
}

impl Scheduler {
    /// Opens the scheduling namespace at `path` and derives its regions.
    pub async fn open<S: Store>(store: &S, path: &[&str]) -> Result<Self, ScheduleError> {
        let prefix = store.open_namespace(path).await?;
        info!(?path, "opened scheduling namespace");
        Ok(Self::with_namespace(Subspace::new(prefix)))
    }

    /// Builds a scheduler over an already-allocated namespace prefix.
    pub fn with_namespace(root: Subspace) -> Self {
        let classes = root.sub("class");
        let attendance = root.sub("attends");
        Self {
            root,
            classes,
            attendance,
        }
    }

    /// The namespace this scheduler owns.
    pub fn namespace(&self) -> &Subspace {
        &self.root
    }

    fn class_key(&self, class: &str) -> Key {
        self.classes.pack(&[Element::from(class)])
    }

    fn attendance_key(&self, student: &str, class: &str) -> Key {
        self.attendance
            .pack(&[Element::from(student), Element::from(class)])
    }

    /// Resets the namespace to offer exactly `classes`, each with
    /// `seats_per_class` seats. A full reset: every prior class record and
    /// every enrollment is cleared in the same transaction.
    pub async fn init<S: Store>(
        &self,
        t: &Transactor<S>,
        classes: &[String],
        seats_per_class: u32,
    ) -> Result<(), ScheduleError> {
        t.run(TransactionMode::ReadWrite, move |tx| async move {
            let (begin, end) = self.root.range();
            tx.clear_range(&begin, &end).await?;
            for name in classes {
                tx.set(&self.class_key(name), &encode_seats(i64::from(seats_per_class)))
                    .await?;
            }
            Ok(())
        })
        .await?;
        info!(classes = classes.len(), seats_per_class, "initialized class offering");
        Ok(())
    }

    /// Lists the offered classes in ascending lexicographic order.
    pub async fn list_classes<S: Store>(&self, t: &Transactor<S>) -> Result<Vec<String>, ScheduleError> {
        t.run(TransactionMode::ReadOnly, move |tx| async move {
            let (begin, end) = self.classes.range();
            let rows = tx.get_range(&begin, &end).await?;
            let mut names = Vec::with_capacity(rows.len());
            for (key, _) in rows {
                let elements = self.classes.unpack(&key)?;
                names.push(single_text(elements, "class record key")?);
            }
            Ok(names)
        })
        .await
    }

    /// Enrolls `student` in `class`.
    ///
    /// Signing up twice is a no-op; the seat is only charged once. Fails with
    /// [`ScheduleError::ClassNotFound`] for an unknown class and
    /// [`ScheduleError::NoRemainingSeats`] when capacity is exhausted, in
    /// which case nothing is modified.
    pub async fn signup<S: Store>(
        &self,
        t: &Transactor<S>,
        student: &str,
        class: &str,
    ) -> Result<(), ScheduleError> {
        t.run(TransactionMode::ReadWrite, move |tx| async move {
            self.signup_in(&tx, student, class).await
        })
        .await
    }

    /// Withdraws `student` from `class`, releasing the seat.
    ///
    /// Dropping while not enrolled is a no-op. If the class record vanished
    /// under an enrollment (a re-initialization raced this drop), surfaces
    /// [`ScheduleError::ClassNotFound`].
    pub async fn drop_class<S: Store>(
        &self,
        t: &Transactor<S>,
        student: &str,
        class: &str,
    ) -> Result<(), ScheduleError> {
        t.run(TransactionMode::ReadWrite, move |tx| async move {
            self.drop_in(&tx, student, class).await
        })
        .await
    }

    /// Atomically moves `student` from class `from` to class `to`.
    ///
    /// Composed from [`drop_class`](Self::drop_class) and
    /// [`signup`](Self::signup) through a nested transactor: both halves run
    /// on one transaction, so a failed signup also rolls back the drop.
    pub async fn switch_class<S: Store>(
        &self,
        t: &Transactor<S>,
        student: &str,
        from: &str,
        to: &str,
    ) -> Result<(), ScheduleError> {
        t.run(TransactionMode::ReadWrite, move |tx| async move {
            let nested = Transactor::<S>::Transaction(tx);
            self.drop_class(&nested, student, from).await?;
            self.signup(&nested, student, to).await
        })
        .await
    }

    /// Remaining seat count for `class`.
    pub async fn seats_remaining<S: Store>(
        &self,
        t: &Transactor<S>,
        class: &str,
    ) -> Result<i64, ScheduleError> {
        t.run(TransactionMode::ReadOnly, move |tx| async move {
            let raw = tx
                .get(&self.class_key(class))
                .await?
                .ok_or_else(|| ScheduleError::ClassNotFound(class.to_owned()))?;
            decode_seats(class, &raw)
        })
        .await
    }

    /// Classes `student` is currently enrolled in, ascending.
    pub async fn enrolled_classes<S: Store>(
        &self,
        t: &Transactor<S>,
        student: &str,
    ) -> Result<Vec<String>, ScheduleError> {
        t.run(TransactionMode::ReadOnly, move |tx| async move {
            let student_space = self.attendance.sub(student);
            let (begin, end) = student_space.range();
            let rows = tx.get_range(&begin, &end).await?;
            let mut names = Vec::with_capacity(rows.len());
            for (key, _) in rows {
                let elements = student_space.unpack(&key)?;
                names.push(single_text(elements, "attendance record key")?);
            }
            Ok(names)
        })
        .await
    }

    async fn signup_in<T: StoreTransaction>(
        &self,
        tx: &T,
        student: &str,
        class: &str,
    ) -> Result<(), ScheduleError> {
        let class_key = self.class_key(class);
        let seats_raw = tx
            .get(&class_key)
            .await?
            .ok_or_else(|| ScheduleError::ClassNotFound(class.to_owned()))?;

        let attendance_key = self.attendance_key(student, class);
        if tx.get(&attendance_key).await?.is_some() {
            // Already enrolled; the seat was charged on the first signup.
            return Ok(());
        }

        let seats = decode_seats(class, &seats_raw)?;
        if seats <= 0 {
            return Err(ScheduleError::NoRemainingSeats(class.to_owned()));
        }

        tx.set(&class_key, &encode_seats(seats - 1)).await?;
        tx.set(&attendance_key, b"").await?;
        Ok(())
    }

    async fn drop_in<T: StoreTransaction>(
        &self,
        tx: &T,
        student: &str,
        class: &str,
    ) -> Result<(), ScheduleError> {
        let attendance_key = self.attendance_key(student, class);
        if tx.get(&attendance_key).await?.is_none() {
            return Ok(());
        }

        let class_key = self.class_key(class);
        let seats_raw = tx
            .get(&class_key)
            .await?
            .ok_or_else(|| ScheduleError::ClassNotFound(class.to_owned()))?;
        let seats = decode_seats(class, &seats_raw)?;

        tx.clear(&attendance_key).await?;
        tx.set(&class_key, &encode_seats(seats + 1)).await?;
        Ok(())
    }
}

// Seat counts travel as decimal ASCII, the wire form the scheduling data
// model was defined with.
fn encode_seats(seats: i64) -> Vec<u8> {
    seats.to_string().into_bytes()
}

fn decode_seats(class: &str, raw: &[u8]) -> Result<i64, ScheduleError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| {
            ScheduleError::Corrupt(format!("seat count for {class:?} is not a decimal integer"))
        })
}

fn single_text(mut elements: Vec<Element>, what: &str) -> Result<String, ScheduleError> {
    match (elements.pop(), elements.is_empty()) {
        (Some(Element::Text(name)), true) => Ok(name),
        _ => Err(ScheduleError::Corrupt(format!(
            "{what} does not decode to a single name"
        ))),
    }
}
