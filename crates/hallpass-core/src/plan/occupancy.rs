//! Checking a plan against the seats already taken in a schedule.

use std::collections::HashMap;

use hallpass_db::models::Allocation;

use super::item::PlanItem;
use crate::error::AllocationError;

/// Every allocation of one schedule, indexed by student and by seat.
///
/// Built from one read of the schedule's rows, so the whole plan is
/// checked against a single consistent picture of the store.
#[derive(Debug, Clone)]
pub struct Occupancy {
    schedule_id: i32,
    /// Registered students and the seat each holds, if any.
    seat_of: HashMap<String, Option<(i32, String)>>,
    /// Seated `(hall, seat)` pairs and who holds them.
    holder_of: HashMap<(i32, String), String>,
}

impl Occupancy {
    pub fn from_allocations(schedule_id: i32, allocations: &[Allocation]) -> Self {
        let mut seat_of = HashMap::with_capacity(allocations.len());
        let mut holder_of = HashMap::new();
        for alloc in allocations {
            let seat = alloc.seat().map(|(hall, seat)| (hall, seat.to_owned()));
            if let Some(key) = &seat {
                holder_of.insert(key.clone(), alloc.student_id.clone());
            }
            seat_of.insert(alloc.student_id.clone(), seat);
        }
        Self {
            schedule_id,
            seat_of,
            holder_of,
        }
    }

    pub fn schedule_id(&self) -> i32 {
        self.schedule_id
    }

    /// Number of registered students.
    pub fn registered(&self) -> usize {
        self.seat_of.len()
    }

    /// Number of seated students.
    pub fn seated(&self) -> usize {
        self.holder_of.len()
    }

    /// Walk the plan in order, applying each item to a scratch copy.
    ///
    /// An item may take a seat held by a different student only if an
    /// earlier item in the plan has already moved that student away. A
    /// student keeping their own seat is not a conflict. Every target
    /// student must already be registered for the schedule.
    pub fn check(&self, items: &[PlanItem]) -> Result<(), AllocationError> {
        let mut holder_of = self.holder_of.clone();
        let mut seat_of = self.seat_of.clone();

        for item in items {
            let key = (item.hall_id, item.seat.as_str().to_owned());

            match holder_of.get(&key) {
                Some(holder) if *holder != item.student_id => {
                    return Err(AllocationError::SeatAlreadyOccupied {
                        hall_id: item.hall_id,
                        seat: key.1,
                        student_id: item.student_id.clone(),
                        occupant: Some(holder.clone()),
                    });
                }
                _ => {}
            }

            let Some(current) = seat_of.get_mut(&item.student_id) else {
                return Err(AllocationError::AllocationNotFound {
                    student_id: item.student_id.clone(),
                    schedule_id: self.schedule_id,
                });
            };

            if let Some(previous) = current.replace(key.clone()) {
                holder_of.remove(&previous);
            }
            holder_of.insert(key, item.student_id.clone());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::seat::SeatLabel;

    fn alloc(id: i32, student: &str, seat: Option<(i32, &str)>) -> Allocation {
        Allocation {
            allocation_id: id,
            student_id: student.to_owned(),
            schedule_id: 10,
            hall_id: seat.map(|(hall, _)| hall),
            seat_number: seat.map(|(_, label)| label.to_owned()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(student: &str, hall: i32, seat: &str) -> PlanItem {
        PlanItem {
            student_id: student.to_owned(),
            hall_id: hall,
            seat: SeatLabel::parse(seat).unwrap(),
        }
    }

    fn occupancy() -> Occupancy {
        Occupancy::from_allocations(
            10,
            &[
                alloc(1, "X", Some((1, "A1"))),
                alloc(2, "Y", None),
                alloc(3, "Z", None),
            ],
        )
    }

    #[test]
    fn counts_registered_and_seated() {
        let occ = occupancy();
        assert_eq!(occ.schedule_id(), 10);
        assert_eq!(occ.registered(), 3);
        assert_eq!(occ.seated(), 1);
    }

    #[test]
    fn occupied_seat_is_rejected() {
        let err = occupancy().check(&[item("Y", 1, "A1")]).unwrap_err();
        match err {
            AllocationError::SeatAlreadyOccupied {
                hall_id,
                seat,
                student_id,
                occupant,
            } => {
                assert_eq!(hall_id, 1);
                assert_eq!(seat, "A1");
                assert_eq!(student_id, "Y");
                assert_eq!(occupant.as_deref(), Some("X"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn free_seat_is_accepted() {
        assert!(occupancy().check(&[item("Y", 1, "A2")]).is_ok());
    }

    #[test]
    fn same_label_in_other_hall_is_free() {
        assert!(occupancy().check(&[item("Y", 2, "A1")]).is_ok());
    }

    #[test]
    fn student_may_keep_own_seat() {
        assert!(occupancy().check(&[item("X", 1, "A1")]).is_ok());
    }

    #[test]
    fn seat_freed_earlier_in_plan_can_be_taken() {
        let plan = [item("X", 1, "B1"), item("Y", 1, "A1")];
        assert!(occupancy().check(&plan).is_ok());
    }

    #[test]
    fn seat_freed_later_in_plan_is_still_occupied() {
        let plan = [item("Y", 1, "A1"), item("X", 1, "B1")];
        assert_eq!(
            occupancy().check(&plan).unwrap_err().kind(),
            "seat_already_occupied"
        );
    }

    #[test]
    fn unregistered_student_is_rejected() {
        match occupancy().check(&[item("W", 1, "C1")]).unwrap_err() {
            AllocationError::AllocationNotFound {
                student_id,
                schedule_id,
            } => {
                assert_eq!(student_id, "W");
                assert_eq!(schedule_id, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn checking_does_not_change_the_snapshot() {
        let occ = occupancy();
        let plan = [item("Y", 1, "A2")];
        let first = occ.check(&plan).is_ok();
        let second = occ.check(&plan).is_ok();
        assert_eq!(first, second);
        assert_eq!(occ.seated(), 1);
    }
}
